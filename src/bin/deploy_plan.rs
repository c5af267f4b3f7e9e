use clap::Parser;
use stock_tracker::config::deploy::{DeploymentConfig, StackKind};
use stock_tracker::utils::{logger, validation::Validate};

#[derive(Parser)]
#[command(name = "deploy-plan")]
#[command(about = "Print the deployment plan for one stack as JSON, from the CI environment")]
struct Args {
    /// Stack to plan: 'registry' (alias 'ecr') or 'service'
    #[arg(long, default_value = "service")]
    stack: StackKind,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    let config = match DeploymentConfig::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Deployment configuration invalid: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    };

    let plan = config.plan(args.stack);
    tracing::info!(
        "Planned {} stack in {} for {}",
        plan.stack,
        plan.region,
        plan.images.commit
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&plan)?
    } else {
        serde_json::to_string(&plan)?
    };
    println!("{}", json);
    Ok(())
}
