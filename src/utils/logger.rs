use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

pub fn init_cli_logger(verbose: bool) {
    let filter = if verbose {
        default_filter("stock_tracker=debug,info")
    } else {
        default_filter("stock_tracker=info,warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Long-running dashboard process: keeps targets so request traces from
/// `tower_http` can be told apart from application events.
pub fn init_server_logger() {
    tracing_subscriber::registry()
        .with(default_filter("stock_tracker=info,tower_http=info,warn"))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

pub fn init_lambda_logger() {
    tracing_subscriber::registry()
        .with(default_filter("stock_tracker=info"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .without_time()
                .json(), // CloudWatch adds its own timestamps
        )
        .init();
}
