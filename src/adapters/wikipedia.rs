use crate::domain::model::MarketIndex;
use crate::domain::ports::ConstituentSource;
use crate::utils::error::{Result, TrackerError};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_WIKI_BASE_URL: &str = "https://en.wikipedia.org/wiki";

const SP500_PAGE: &str = "List_of_S%26P_500_companies";
const NASDAQ100_PAGE: &str = "Nasdaq-100";
const USER_AGENT: &str = "stock-tracker/0.1 (index constituent lookup)";

static TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b([^>]*)>(.*?)</table>").expect("valid pattern"));
static ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("valid pattern"));
static CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("valid pattern"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid pattern"));
static ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bid\s*=\s*"([^"]*)""#).expect("valid pattern"));
static CLASS_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bclass\s*=\s*"([^"]*)""#).expect("valid pattern"));

/// How to locate the constituents table on a page and which column holds the ticker.
#[derive(Debug, Clone, Copy)]
pub enum TableSelector {
    Id(&'static str),
    /// First table whose class list contains all of these classes.
    Classes(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct ConstituentTable {
    pub page: &'static str,
    pub selector: TableSelector,
    pub ticker_column: usize,
}

impl ConstituentTable {
    pub fn for_index(index: MarketIndex) -> Option<Self> {
        match index {
            MarketIndex::Sp500 => Some(Self {
                page: SP500_PAGE,
                selector: TableSelector::Id("constituents"),
                ticker_column: 0,
            }),
            MarketIndex::Nasdaq100 => Some(Self {
                page: NASDAQ100_PAGE,
                selector: TableSelector::Classes(&["wikitable", "sortable"]),
                ticker_column: 1,
            }),
            MarketIndex::MyStocks => None,
        }
    }
}

fn matches_selector(attrs: &str, selector: TableSelector) -> bool {
    match selector {
        TableSelector::Id(id) => ID_ATTR
            .captures(attrs)
            .is_some_and(|c| c.get(1).is_some_and(|m| m.as_str() == id)),
        TableSelector::Classes(wanted) => CLASS_ATTR.captures(attrs).is_some_and(|c| {
            let classes: Vec<&str> = c
                .get(1)
                .map(|m| m.as_str().split_whitespace().collect())
                .unwrap_or_default();
            wanted.iter().all(|w| classes.contains(w))
        }),
    }
}

fn cell_text(raw: &str) -> String {
    TAG.replace_all(raw, "")
        .replace("&amp;", "&")
        .replace("&#160;", " ")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

/// Ticker column of the selected table; rows without enough cells (headers) are skipped.
pub fn parse_constituents(html: &str, table: &ConstituentTable) -> Result<Vec<String>> {
    let body = TABLE
        .captures_iter(html)
        .find(|c| matches_selector(&c[1], table.selector))
        .map(|c| c[2].to_string())
        .ok_or_else(|| TrackerError::ParseError {
            source_name: table.page.to_string(),
            message: "constituents table not found".to_string(),
        })?;

    let tickers: Vec<String> = ROW
        .captures_iter(&body)
        .filter_map(|row| {
            CELL.captures_iter(&row[1])
                .nth(table.ticker_column)
                .map(|cell| cell_text(&cell[1]))
        })
        .filter(|t| !t.is_empty())
        .collect();

    if tickers.is_empty() {
        return Err(TrackerError::ParseError {
            source_name: table.page.to_string(),
            message: "constituents table has no rows".to_string(),
        });
    }

    Ok(tickers)
}

#[derive(Debug, Clone)]
pub struct WikipediaConstituents {
    client: Client,
    base_url: String,
}

impl WikipediaConstituents {
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
}

#[async_trait]
impl ConstituentSource for WikipediaConstituents {
    async fn constituents(&self, index: MarketIndex) -> Result<Vec<String>> {
        let table = ConstituentTable::for_index(index).ok_or_else(|| TrackerError::ConfigError {
            message: format!("{} has no published constituent list", index),
        })?;

        let url = format!("{}/{}", self.base_url, table.page);
        tracing::debug!("Scraping {} constituents from {}", index, url);

        let html = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let tickers = parse_constituents(&html, &table)?;
        tracing::info!("Found {} {} tickers", tickers.len(), index);
        Ok(tickers)
    }
}
