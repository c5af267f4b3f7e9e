#[cfg(feature = "lambda")]
use aws_config::BehaviorVersion;
#[cfg(feature = "lambda")]
use aws_sdk_s3::config::Region;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "lambda")]
use stock_tracker::adapters::{EmailDistributor, YahooChartClient};
#[cfg(feature = "lambda")]
use stock_tracker::core::report::{self, ReportDistributor, ReportOptions, StockReport};
#[cfg(feature = "lambda")]
use stock_tracker::core::Storage;
#[cfg(feature = "lambda")]
use stock_tracker::domain::model::StockSummary;
#[cfg(feature = "lambda")]
use stock_tracker::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use stock_tracker::{EtlEngine, LambdaConfig, S3Storage, ScreenerPipeline};

/// Scheduled invocations send an empty object; every field is optional.
#[cfg(feature = "lambda")]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Request {
    pub s3_prefix: Option<String>,
    pub my_stocks: Option<Vec<String>>,
}

#[cfg(feature = "lambda")]
#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub output_path: String,
    pub timestamp: String,
    pub from_cache: bool,
    pub stocks_screened: usize,
    pub buy: Vec<String>,
    pub sell: Vec<String>,
    /// Recipients the report was emailed to; empty when email is not configured.
    pub emailed_to: Vec<String>,
}

#[cfg(feature = "lambda")]
fn boxed(e: stock_tracker::TrackerError) -> Error {
    tracing::error!(
        "Screener failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    Box::new(e)
}

#[cfg(feature = "lambda")]
fn tickers(stocks: &[StockSummary]) -> Vec<String> {
    stocks.iter().map(|s| s.ticker.clone()).collect()
}

#[cfg(feature = "lambda")]
async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    tracing::info!("Starting screener Lambda function");

    let mut config = LambdaConfig::from_env().map_err(boxed)?;
    if let Some(prefix) = event.payload.s3_prefix {
        config.s3_prefix = prefix;
    }
    if let Some(my_stocks) = event.payload.my_stocks {
        config.my_stocks = my_stocks;
    }
    config.validate().map_err(boxed)?;

    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .region(Region::new(config.s3_region.clone()))
        .build();
    let s3_client = S3Client::from_conf(s3_config);

    let storage = S3Storage::new(s3_client, config.s3_bucket.clone(), config.s3_prefix.clone());
    let report_storage = storage.clone();
    let email = config.email.clone();
    let chart_base_url = config.chart_base_url.clone();
    let pipeline = ScreenerPipeline::new(storage, config).map_err(boxed)?;

    let outcome = EtlEngine::new(pipeline).run().await.map_err(boxed)?;
    let result = outcome.output;

    let mut emailed_to = Vec::new();
    if let Some(email) = email {
        let market = YahooChartClient::new(chart_base_url).map_err(boxed)?;
        let options = ReportOptions::default();
        let report = StockReport::generate(&result.stocks, &options, result.timestamp.clone())
            .with_stock_charts(&market)
            .await;
        let html = report::render_html(&report);
        let file_name = format!("stock_report_{}.html", result.timestamp);
        report_storage
            .write_file(&file_name, html.as_bytes())
            .await
            .map_err(boxed)?;

        emailed_to = email.recipients.clone();
        EmailDistributor::new(email)
            .map_err(boxed)?
            .send_report(&report, Some((file_name.as_str(), html.as_bytes())))
            .await
            .map_err(boxed)?;
    }

    let response = Response {
        message: "Screener run completed successfully".to_string(),
        output_path: outcome.output_path,
        timestamp: result.timestamp.clone(),
        from_cache: result.from_cache,
        stocks_screened: result.stocks.len(),
        buy: tickers(&result.buy_list),
        sell: tickers(&result.sell_list),
        emailed_to,
    };

    tracing::info!(
        "Screener Lambda function completed: {} buy, {} sell",
        response.buy.len(),
        response.sell.len()
    );
    Ok(response)
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    run(service_fn(function_handler)).await
}
