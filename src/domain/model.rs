use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One trading day of OHLCV data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Daily bars for a ticker, ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl Period {
    pub const ALL: [Period; 6] = [
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
        Period::TwoYears,
        Period::FiveYears,
    ];

    /// Range parameter understood by the chart API.
    pub fn as_range(&self) -> &'static str {
        match self {
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::OneMonth => "1 Month",
            Period::ThreeMonths => "3 Months",
            Period::SixMonths => "6 Months",
            Period::OneYear => "1 Year",
            Period::TwoYears => "2 Years",
            Period::FiveYears => "5 Years",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_range())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_range() == s)
            .ok_or_else(|| format!("unknown period '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    Period(Period),
    /// Trailing calendar days ending now.
    Days(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketIndex {
    #[serde(rename = "S&P 500")]
    Sp500,
    #[serde(rename = "NASDAQ 100")]
    Nasdaq100,
    #[serde(rename = "My Stocks")]
    MyStocks,
}

impl MarketIndex {
    pub fn label(&self) -> &'static str {
        match self {
            MarketIndex::Sp500 => "S&P 500",
            MarketIndex::Nasdaq100 => "NASDAQ 100",
            MarketIndex::MyStocks => "My Stocks",
        }
    }
}

impl fmt::Display for MarketIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One screener row. Field names on disk match the snapshot CSV headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSummary {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Index")]
    pub index: MarketIndex,
    #[serde(rename = "Current_Price")]
    pub current_price: f64,
    #[serde(rename = "Weekly_Price_Change")]
    pub weekly_price_change: f64,
    #[serde(rename = "Weekly_Percentage_Change")]
    pub weekly_percentage_change: f64,
    #[serde(rename = "Monthly_Price_Change")]
    pub monthly_price_change: f64,
    #[serde(rename = "Monthly_Percentage_Change")]
    pub monthly_percentage_change: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub from: f64,
    pub to: f64,
    pub absolute: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendSignal {
    Bullish,
    Bearish,
    Neutral,
}

impl TrendSignal {
    pub fn color(&self) -> &'static str {
        match self {
            TrendSignal::Bullish => "green",
            TrendSignal::Bearish => "red",
            TrendSignal::Neutral => "orange",
        }
    }
}

/// Rows fetched for each part of the screener universe.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub sp500: Vec<StockSummary>,
    pub nasdaq100: Vec<StockSummary>,
    pub my_stocks: Vec<StockSummary>,
}

#[derive(Debug, Clone)]
pub enum Extracted {
    Fresh(Universe),
    Cached(CachedSnapshot),
}

#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub timestamp: String,
    pub stocks: Vec<StockSummary>,
    pub actionables: Option<Vec<StockSummary>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreenResult {
    pub timestamp: String,
    pub stocks: Vec<StockSummary>,
    pub actionables: Vec<StockSummary>,
    pub buy_list: Vec<StockSummary>,
    pub sell_list: Vec<StockSummary>,
    pub from_cache: bool,
    /// Whether the actionables snapshot needs writing under `timestamp`.
    #[serde(skip)]
    pub write_actionables: bool,
}
