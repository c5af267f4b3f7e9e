use clap::Parser;
use stock_tracker::domain::model::StockSummary;
use stock_tracker::utils::{logger, validation::Validate};
use stock_tracker::{CliConfig, EtlEngine, LocalStorage, ScreenerPipeline};

fn print_list(title: &str, stocks: &[StockSummary]) {
    println!("\n{} ({})", title, stocks.len());
    for s in stocks {
        println!(
            "  {:<8} {:<11} ${:>9.2}  week {:>7.2}%  month {:>7.2}%",
            s.ticker,
            s.index.label(),
            s.current_price,
            s.weekly_percentage_change,
            s.monthly_percentage_change
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting stock-tracker screener");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path.clone());
    let pipeline = ScreenerPipeline::new(storage, config)?;
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(outcome) => {
            let result = &outcome.output;
            if result.from_cache {
                println!("♻️  Reused snapshot {}", result.timestamp);
            }
            println!(
                "✅ Screened {} stocks, {} actionable",
                result.stocks.len(),
                result.actionables.len()
            );
            print_list("Buy", &result.buy_list);
            print_list("Sell", &result.sell_list);
            println!("\n📁 Output saved to: {}", outcome.output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Screener run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            std::process::exit(e.exit_code());
        }
    }

    Ok(())
}
