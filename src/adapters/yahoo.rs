use crate::domain::model::{HistoryRange, PriceBar, PriceHistory};
use crate::domain::ports::MarketDataSource;
use crate::utils::error::{Result, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

const USER_AGENT: &str = "Mozilla/5.0 (compatible; stock-tracker/0.1)";

/// Daily history from the Yahoo Finance chart endpoint
/// (`{base}/{symbol}?interval=1d&range=1y`).
#[derive(Debug, Clone)]
pub struct YahooChartClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl YahooChartClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Class shares use a dash on the chart API (`BRK.B` -> `BRK-B`).
    pub fn chart_symbol(ticker: &str) -> String {
        ticker.replace('.', "-")
    }

    fn query(range: HistoryRange) -> Vec<(&'static str, String)> {
        let mut query = vec![("interval", "1d".to_string())];
        match range {
            HistoryRange::Period(period) => query.push(("range", period.as_range().to_string())),
            HistoryRange::Days(days) => {
                let end = Utc::now();
                let start = end - chrono::Duration::days(days);
                query.push(("period1", start.timestamp().to_string()));
                query.push(("period2", end.timestamp().to_string()));
            }
        }
        query
    }
}

fn parse_chart(ticker: &str, body: &[u8]) -> Result<PriceHistory> {
    let envelope: ChartEnvelope = serde_json::from_slice(body)?;

    if let Some(err) = envelope.chart.error {
        if err.code == "Not Found" {
            return Err(TrackerError::NoDataError {
                ticker: ticker.to_string(),
            });
        }
        return Err(TrackerError::MarketDataError {
            ticker: ticker.to_string(),
            message: format!(
                "{}: {}",
                err.code,
                err.description.unwrap_or_default()
            ),
        });
    }

    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| TrackerError::NoDataError {
            ticker: ticker.to_string(),
        })?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let bars: Vec<PriceBar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let close = quote.close.get(i).copied().flatten()?;
            let date = DateTime::from_timestamp(ts, 0)?.date_naive();
            let pick = |series: &[Option<f64>]| series.get(i).copied().flatten().unwrap_or(close);
            Some(PriceBar {
                date,
                open: pick(&quote.open),
                high: pick(&quote.high),
                low: pick(&quote.low),
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            })
        })
        .collect();

    if bars.is_empty() {
        return Err(TrackerError::NoDataError {
            ticker: ticker.to_string(),
        });
    }

    Ok(PriceHistory {
        ticker: ticker.to_string(),
        bars,
    })
}

#[async_trait]
impl MarketDataSource for YahooChartClient {
    async fn history(&self, ticker: &str, range: HistoryRange) -> Result<PriceHistory> {
        let url = format!("{}/{}", self.base_url, Self::chart_symbol(ticker));
        tracing::debug!("Fetching chart data: {} {:?}", url, range);

        let response = self
            .client
            .get(&url)
            .query(&Self::query(range))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        // The chart API reports unknown symbols as 404 with an error envelope.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(TrackerError::MarketDataError {
                ticker: ticker.to_string(),
                message: format!("chart API returned HTTP {}", status),
            });
        }

        parse_chart(ticker, &body)
    }
}
