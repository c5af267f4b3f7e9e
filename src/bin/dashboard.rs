use clap::Parser;
use std::path::Path;
use stock_tracker::config::toml_config::DashboardConfig;
use stock_tracker::server::{self, AppState};
use stock_tracker::utils::{logger, validation::Validate};

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Interactive stock chart dashboard with custom MACD indicators")]
struct Args {
    /// Path to TOML configuration file; built-in defaults when it does not exist
    #[arg(short, long, default_value = "config/dashboard.toml")]
    config: String,

    /// Override the bind host from config
    #[arg(long)]
    host: Option<String>,

    /// Override the port from config
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_server_logger();

    let mut config = if Path::new(&args.config).exists() {
        tracing::info!("📁 Loading configuration from: {}", args.config);
        match DashboardConfig::from_file(&args.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        }
    } else {
        tracing::info!("No config file at {}, using defaults", args.config);
        DashboardConfig::default()
    };

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!(
        "Serving {} tickers, history cached for {}s",
        config.tickers.len(),
        config.market_data.cache_ttl_seconds
    );

    let state = AppState::from_config(config)?;
    server::serve(state).await?;
    Ok(())
}
