use clap::Parser;
use stock_tracker::adapters::yahoo::DEFAULT_CHART_BASE_URL;
use stock_tracker::adapters::{DiscordDistributor, EmailDistributor, YahooChartClient};
use stock_tracker::config::toml_config::{DiscordConfig, ReportConfig};
use stock_tracker::core::report::{self, ReportDistributor, ReportOptions, StockReport};
use stock_tracker::core::Storage;
use stock_tracker::utils::{logger, validation::Validate};
use stock_tracker::{LocalStorage, TrackerError};

#[derive(Parser)]
#[command(name = "report")]
#[command(about = "Build an HTML market report from the latest screener snapshot")]
struct Args {
    /// Directory holding the screener snapshots
    #[arg(long, default_value = "./output")]
    output_path: String,

    #[arg(long, default_value = "Stock Market Report")]
    title: String,

    /// Buy and sell recommendations kept in the report
    #[arg(long, default_value = "15")]
    recommendations: usize,

    /// TOML file with [discord] and [email] delivery sections
    #[arg(long)]
    config: Option<String>,

    /// Chart API used for the per-stock charts of held stocks
    #[arg(long, default_value = DEFAULT_CHART_BASE_URL)]
    chart_base_url: String,

    /// Leave out the per-stock charts
    #[arg(long)]
    skip_stock_charts: bool,

    /// Post the report to this Discord webhook; overrides the config file
    #[arg(long, env = "DISCORD_WEBHOOK_URL")]
    discord_webhook: Option<String>,

    #[arg(long, env = "DISCORD_USERNAME")]
    discord_username: Option<String>,

    #[arg(long, env = "DISCORD_AVATAR_URL")]
    discord_avatar_url: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn fail(e: TrackerError) -> ! {
    tracing::error!("❌ {}", e);
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

fn delivery_config(args: &Args) -> Result<ReportConfig, TrackerError> {
    let mut config = match &args.config {
        Some(path) => ReportConfig::from_file(path)?,
        None => ReportConfig::default(),
    };
    if let Some(webhook_url) = &args.discord_webhook {
        config.discord = Some(DiscordConfig {
            webhook_url: webhook_url.clone(),
            username: args.discord_username.clone(),
            avatar_url: args.discord_avatar_url.clone(),
        });
    }
    config.validate()?;
    Ok(config)
}

type Channels = Vec<(&'static str, Box<dyn ReportDistributor>)>;

fn distributors(config: ReportConfig) -> Result<Channels, TrackerError> {
    let mut channels: Channels = Vec::new();

    if let Some(d) = config.discord {
        let mut discord = DiscordDistributor::new(d.webhook_url)?;
        if let Some(username) = d.username {
            discord = discord.with_username(username);
        }
        if let Some(avatar_url) = d.avatar_url {
            discord = discord.with_avatar_url(avatar_url);
        }
        channels.push(("Discord", Box::new(discord)));
    }
    if let Some(email) = config.email {
        channels.push(("email", Box::new(EmailDistributor::new(email)?)));
    }
    Ok(channels)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    let channels = delivery_config(&args)
        .and_then(distributors)
        .unwrap_or_else(|e| fail(e));

    let storage = LocalStorage::new(args.output_path.clone());
    let (timestamp, stocks) = report::load_latest_snapshot(&storage)
        .await
        .unwrap_or_else(|e| fail(e));

    let options = ReportOptions {
        title: args.title,
        recommendations: args.recommendations,
    };
    let mut report = StockReport::generate(&stocks, &options, timestamp.clone());
    if !args.skip_stock_charts {
        let market = YahooChartClient::new(args.chart_base_url)?;
        report = report.with_stock_charts(&market).await;
    }

    let html = report::render_html(&report);
    let file_name = format!("stock_report_{}.html", timestamp);
    storage.write_file(&file_name, html.as_bytes()).await?;
    println!("📁 Report saved to: {}/{}", storage.base_path(), file_name);

    for (name, channel) in &channels {
        if let Err(e) = channel
            .send_report(&report, Some((file_name.as_str(), html.as_bytes())))
            .await
        {
            fail(e);
        }
        println!("✅ Report sent via {}", name);
    }

    Ok(())
}
