#![cfg(feature = "server")]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stock_tracker::config::toml_config::DashboardConfig;
use stock_tracker::domain::model::{HistoryRange, PriceBar, PriceHistory};
use stock_tracker::domain::ports::MarketDataSource;
use stock_tracker::server::{router, AppState};
use stock_tracker::{Result, TrackerError};
use tower::ServiceExt;

/// 80 sessions of accelerating gains for any ticker except the failure cases.
#[derive(Default)]
struct FakeMarket {
    calls: AtomicUsize,
}

#[async_trait]
impl MarketDataSource for FakeMarket {
    async fn history(&self, ticker: &str, range: HistoryRange) -> Result<PriceHistory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(matches!(range, HistoryRange::Period(_)));

        match ticker {
            "ZZZZ" => Err(TrackerError::NoDataError {
                ticker: ticker.to_string(),
            }),
            "DOWN" => Err(TrackerError::MarketDataError {
                ticker: ticker.to_string(),
                message: "chart API returned HTTP 500".to_string(),
            }),
            _ => {
                let start = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
                Ok(PriceHistory {
                    ticker: ticker.to_string(),
                    bars: (0..80)
                        .map(|i| {
                            let x = i as f64;
                            let close = 100.0 + x + 0.05 * x * x;
                            PriceBar {
                                date: start + chrono::Duration::days(i),
                                open: close - 1.0,
                                high: close + 1.0,
                                low: close - 2.0,
                                close,
                                volume: 5_000 + i as u64,
                            }
                        })
                        .collect(),
                })
            }
        }
    }
}

fn app() -> (axum::Router, Arc<FakeMarket>) {
    let market = Arc::new(FakeMarket::default());
    let state = AppState::new(DashboardConfig::default(), market.clone());
    (router(state), market)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _) = app();

    for uri in ["/healthz", "/_stcore/health"] {
        let (status, body) = get_json(app.clone(), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}

#[tokio::test]
async fn test_index_page_served() {
    let (app, _) = app();
    let (status, headers, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert!(String::from_utf8(body).unwrap().contains("Stock Analysis Dashboard"));
}

#[tokio::test]
async fn test_tickers_and_periods() {
    let (app, _) = app();

    let (status, body) = get_json(app.clone(), "/api/tickers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tickers"].as_array().unwrap().len(), 12);
    assert_eq!(body["tickers"][0]["symbol"], "AAPL");
    assert_eq!(body["defaults"]["macd"]["longest_ma"], 60);

    let (_, periods) = get_json(app, "/api/periods").await;
    let values: Vec<&str> = periods
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["value"].as_str().unwrap())
        .collect();
    assert_eq!(values, vec!["1mo", "3mo", "6mo", "1y", "2y", "5y"]);
    assert_eq!(periods[3]["label"], "1 Year");
}

#[tokio::test]
async fn test_stock_analysis_and_cache() {
    let (app, market) = app();

    let (status, body) = get_json(app.clone(), "/api/stocks/aapl?period=6mo&fast_ma=12").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticker"], "AAPL");
    assert_eq!(body["company_name"], "Apple Inc.");
    assert_eq!(body["period"], "6mo");
    assert_eq!(body["macd"]["fast_ma"], 12);
    assert_eq!(body["metrics"]["current_price"], 491.05);
    assert_eq!(body["metrics"]["macd_signal"], "Bullish");
    assert_eq!(body["bars"].as_array().unwrap().len(), 80);
    assert!(body["charts"]["price_macd"]["vconcat"].is_array());
    assert_eq!(
        body["charts"]["moving_averages"]["layer"][1]["encoding"]["y"]["field"],
        "MA_12"
    );
    assert_eq!(body["charts"]["volume"]["mark"], "bar");

    // same ticker and period comes from the cache
    let (status, _) = get_json(app.clone(), "/api/stocks/AAPL?period=6mo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(market.calls.load(Ordering::SeqCst), 1);

    let (status, _) = get_json(app, "/api/stocks/AAPL?period=1y").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(market.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stock_error_statuses() {
    let (app, _) = app();

    let (status, body) = get_json(app.clone(), "/api/stocks/AAPL?fast_ma=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("fast_ma"));

    let (status, _) = get_json(app.clone(), "/api/stocks/AAPL?period=10y").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(app.clone(), "/api/stocks/AA%20PL").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_json(app.clone(), "/api/stocks/ZZZZ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No data found for ticker ZZZZ");

    let (status, _) = get_json(app, "/api/stocks/DOWN").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_blank_and_malformed_query_values() {
    let (app, _) = app();

    // cleared inputs fall back to the defaults
    let (status, body) =
        get_json(app.clone(), "/api/stocks/AAPL?period=1y&fast_ma=&slow_ma=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["macd"]["fast_ma"], 10);

    let (status, headers, body) = get(app, "/api/stocks/AAPL?period=1y&fast_ma=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("fast_ma"));
}

#[tokio::test]
async fn test_csv_download() {
    let (app, _) = app();
    let (status, headers, body) = get(app, "/api/stocks/MSFT/csv?period=3mo").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"MSFT_stock_data.csv\""
    );
    let csv = String::from_utf8(body).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next().unwrap(), "Date,Open,High,Low,Close,Volume");
    assert_eq!(lines.next().unwrap(), "2025-01-02,99.0,101.0,98.0,100.0,5000");
    assert_eq!(csv.lines().count(), 81);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = app();
    let (status, _, _) = get(app, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
