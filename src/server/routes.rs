use crate::config::toml_config::{DefaultsConfig, TickerEntry};
use crate::core::charts;
use crate::core::indicators::{custom_macd, standard_macd, trend_signal, MacdPeriods};
use crate::core::movers::{price_change, round2, DASHBOARD_MONTH_SESSIONS, WEEK_SESSIONS};
use crate::domain::model::{HistoryRange, Period, PriceBar, PriceHistory, TrendSignal};
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::{self, Validate};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const DASHBOARD_PAGE: &str = include_str!("../../assets/dashboard.html");

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn index() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}

#[derive(Debug, Serialize)]
pub struct TickersResponse {
    pub tickers: Vec<TickerEntry>,
    pub defaults: DefaultsConfig,
}

pub async fn tickers(State(state): State<AppState>) -> Json<TickersResponse> {
    Json(TickersResponse {
        tickers: state.config.tickers.clone(),
        defaults: state.config.defaults.clone(),
    })
}

#[derive(Debug, Serialize)]
pub struct PeriodOption {
    pub value: Period,
    pub label: &'static str,
}

pub async fn periods() -> Json<Vec<PeriodOption>> {
    Json(
        Period::ALL
            .into_iter()
            .map(|value| PeriodOption {
                value,
                label: value.label(),
            })
            .collect(),
    )
}

/// Query string of the stock endpoints; absent or empty values fall back to
/// the configured defaults. Numbers are kept as text so that malformed input
/// is reported through `ApiError` instead of the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    pub period: Option<String>,
    pub fast_ma: Option<String>,
    pub slow_ma: Option<String>,
    pub longest_ma: Option<String>,
    pub signal_period: Option<String>,
}

fn window_param(name: &str, raw: Option<&str>, default: usize) -> Result<usize> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| TrackerError::ValidationError {
            message: format!("{} must be a whole number, got '{}'", name, v),
        }),
    }
}

impl StockQuery {
    fn period(&self, defaults: &DefaultsConfig) -> Result<Period> {
        match self.period.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(defaults.period),
            Some(raw) => raw
                .parse::<Period>()
                .map_err(|message| TrackerError::ValidationError { message }),
        }
    }

    fn macd_periods(&self, defaults: &DefaultsConfig) -> Result<MacdPeriods> {
        let d = defaults.macd;
        let periods = MacdPeriods {
            fast_ma: window_param("fast_ma", self.fast_ma.as_deref(), d.fast_ma)?,
            slow_ma: window_param("slow_ma", self.slow_ma.as_deref(), d.slow_ma)?,
            longest_ma: window_param("longest_ma", self.longest_ma.as_deref(), d.longest_ma)?,
            signal_period: window_param(
                "signal_period",
                self.signal_period.as_deref(),
                d.signal_period,
            )?,
        };
        periods.validate()?;
        Ok(periods)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineMetrics {
    pub current_price: f64,
    pub weekly_change: f64,
    pub monthly_change: f64,
    pub macd_signal: TrendSignal,
    pub signal_color: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StockCharts {
    pub price_macd: Value,
    pub moving_averages: Value,
    pub volume: Value,
}

#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub ticker: String,
    pub company_name: Option<String>,
    pub period: Period,
    pub period_label: &'static str,
    pub macd: MacdPeriods,
    pub metrics: HeadlineMetrics,
    pub charts: StockCharts,
    pub bars: Vec<PriceBar>,
}

/// Price and weekly/monthly percentage change over the last close, plus the
/// combined MACD reading. `None` for an empty history.
pub fn headline_metrics(history: &PriceHistory, periods: MacdPeriods) -> Option<HeadlineMetrics> {
    let closes = history.closes();
    let weekly = price_change(&closes, WEEK_SESSIONS)?;
    let monthly = price_change(&closes, DASHBOARD_MONTH_SESSIONS)?;

    let signal = trend_signal(&standard_macd(&closes), &custom_macd(&closes, periods));

    Some(HeadlineMetrics {
        current_price: round2(weekly.to),
        weekly_change: round2(weekly.percent),
        monthly_change: round2(monthly.percent),
        macd_signal: signal,
        signal_color: signal.color(),
    })
}

fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim().to_ascii_uppercase();
    validation::validate_ticker("ticker", &ticker)?;
    Ok(ticker)
}

async fn load_history(state: &AppState, ticker: &str, period: Period) -> Result<Arc<PriceHistory>> {
    if let Some(history) = state.cache.get(ticker, period).await {
        tracing::debug!("Cache hit for {} ({})", ticker, period);
        return Ok(history);
    }

    let history = state
        .market
        .history(ticker, HistoryRange::Period(period))
        .await?;
    if history.is_empty() {
        return Err(TrackerError::NoDataError {
            ticker: ticker.to_string(),
        });
    }

    tracing::info!("Fetched {} bars for {} ({})", history.bars.len(), ticker, period);
    Ok(state.cache.insert(ticker, period, history).await)
}

pub async fn stock(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<StockQuery>,
) -> std::result::Result<Json<StockResponse>, ApiError> {
    let ticker = normalize_ticker(&ticker)?;
    let period = query.period(&state.config.defaults)?;
    let macd_periods = query.macd_periods(&state.config.defaults)?;

    let history = load_history(&state, &ticker, period).await?;
    let closes = history.closes();
    let metrics = headline_metrics(&history, macd_periods).ok_or_else(|| TrackerError::NoDataError {
        ticker: ticker.clone(),
    })?;

    let specs = StockCharts {
        price_macd: charts::price_macd_chart(&history, &standard_macd(&closes)),
        moving_averages: charts::moving_averages_chart(
            &history,
            &custom_macd(&closes, macd_periods),
        ),
        volume: charts::volume_chart(&history),
    };

    Ok(Json(StockResponse {
        company_name: state.config.company_name(&ticker).map(str::to_string),
        ticker,
        period,
        period_label: period.label(),
        macd: macd_periods,
        metrics,
        charts: specs,
        bars: history.bars.clone(),
    }))
}

#[derive(Serialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: u64,
}

pub fn history_csv(history: &PriceHistory) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for bar in &history.bars {
        wtr.serialize(CsvRow {
            date: bar.date.format("%Y-%m-%d").to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        })?;
    }
    wtr.into_inner().map_err(|e| TrackerError::ProcessingError {
        message: format!("Failed to finish CSV: {}", e),
    })
}

pub async fn stock_csv(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<StockQuery>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let ticker = normalize_ticker(&ticker)?;
    let period = query.period(&state.config.defaults)?;

    let history = load_history(&state, &ticker, period).await?;
    let body = history_csv(&history)?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}_stock_data.csv\"", ticker),
        ),
    ];
    Ok((headers, body))
}
