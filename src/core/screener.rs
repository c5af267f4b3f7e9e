use crate::domain::model::{StockSummary, Universe};
use crate::utils::error::{Result, TrackerError};
use chrono::{NaiveDateTime, TimeDelta};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";

pub const DEFAULT_MY_STOCKS: [&str; 9] = [
    "SPX", "SPY", "VIX", "ABBV", "LMT", "EUAD", "PLTR", "CVNA", "KMX",
];

static STOCKS_SNAPSHOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^stocks_(\d{8}_\d{4})\.csv$").expect("snapshot pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Absolute dollar move over a week.
    pub weekly_price: f64,
    /// Absolute percentage move over a week.
    pub weekly_percent: f64,
    /// Minimum dollar gain over a month.
    pub monthly_price: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            weekly_price: 10.0,
            weekly_percent: 5.0,
            monthly_price: 1.0,
        }
    }
}

pub fn stocks_file_name(timestamp: &str) -> String {
    format!("stocks_{}.csv", timestamp)
}

pub fn actionables_file_name(timestamp: &str) -> String {
    format!("actionables_{}.csv", timestamp)
}

pub fn bundle_file_name(timestamp: &str) -> String {
    format!("screener_{}.zip", timestamp)
}

/// Newest `stocks_<ts>.csv` among `files`, returned as its timestamp.
pub fn latest_snapshot(files: &[String]) -> Option<(String, NaiveDateTime)> {
    files
        .iter()
        .filter_map(|name| {
            let caps = STOCKS_SNAPSHOT.captures(name)?;
            let ts = caps.get(1)?.as_str();
            let at = NaiveDateTime::parse_from_str(ts, SNAPSHOT_TIMESTAMP_FORMAT).ok()?;
            Some((ts.to_string(), at))
        })
        .max_by_key(|(_, at)| *at)
}

/// Timestamp of the newest snapshot if it is younger than `ttl` at `now`.
pub fn fresh_snapshot(files: &[String], now: NaiveDateTime, ttl: TimeDelta) -> Option<String> {
    let (ts, at) = latest_snapshot(files)?;
    let age = now - at;
    if age >= TimeDelta::zero() && age < ttl {
        Some(ts)
    } else {
        None
    }
}

/// S&P 500 rows, then NASDAQ-100 rows, deduplicated by ticker (first wins),
/// without the personal watchlist tickers, followed by the watchlist rows,
/// sorted by ticker.
pub fn merge_universe(universe: Universe, my_stocks: &[String]) -> Vec<StockSummary> {
    let mine: HashSet<&str> = my_stocks.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    let mut combined: Vec<StockSummary> = universe
        .sp500
        .into_iter()
        .chain(universe.nasdaq100)
        .filter(|s| seen.insert(s.ticker.clone()))
        .filter(|s| !mine.contains(s.ticker.as_str()))
        .collect();

    combined.extend(universe.my_stocks);
    combined.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    combined
}

pub fn is_actionable(stock: &StockSummary, thresholds: &Thresholds) -> bool {
    let weekly_move = stock.weekly_price_change.abs() > thresholds.weekly_price
        || stock.weekly_percentage_change.abs() > thresholds.weekly_percent;
    weekly_move && stock.monthly_price_change > thresholds.monthly_price
}

pub fn actionables(stocks: &[StockSummary], thresholds: &Thresholds) -> Vec<StockSummary> {
    stocks
        .iter()
        .filter(|s| is_actionable(s, thresholds))
        .cloned()
        .collect()
}

/// Splits actionables into (buy, sell), each ordered by weekly dollar move
/// descending: sells moved up more than the threshold, buys moved down.
pub fn trading_lists(
    actionables: &[StockSummary],
    thresholds: &Thresholds,
) -> (Vec<StockSummary>, Vec<StockSummary>) {
    let mut sorted = actionables.to_vec();
    sorted.sort_by(|a, b| b.weekly_price_change.total_cmp(&a.weekly_price_change));

    let sell = sorted
        .iter()
        .filter(|s| s.weekly_price_change > thresholds.weekly_price)
        .cloned()
        .collect();
    let buy = sorted
        .into_iter()
        .filter(|s| s.weekly_price_change < -thresholds.weekly_price)
        .collect();
    (buy, sell)
}

pub fn encode_csv(stocks: &[StockSummary]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for stock in stocks {
        wtr.serialize(stock)?;
    }
    wtr.into_inner()
        .map_err(|e| TrackerError::IoError(e.into_error()))
}

pub fn decode_csv(data: &[u8]) -> Result<Vec<StockSummary>> {
    let mut rdr = csv::Reader::from_reader(data);
    let mut stocks = Vec::new();
    for row in rdr.deserialize() {
        stocks.push(row?);
    }
    Ok(stocks)
}

/// Keeps the first row for every ticker.
pub fn dedupe_by_ticker(stocks: Vec<StockSummary>) -> Vec<StockSummary> {
    let mut seen = HashSet::new();
    stocks
        .into_iter()
        .filter(|s| seen.insert(s.ticker.clone()))
        .collect()
}
