use crate::adapters::yahoo::DEFAULT_CHART_BASE_URL;
use crate::config::email::EmailConfig;
use crate::core::indicators::MacdPeriods;
use crate::domain::model::Period;
use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Replaces `${VAR}` with the environment value; unset variables are left as-is.
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
}

fn parse_toml<T: serde::de::DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(&substitute_env_vars(content)).map_err(|e| TrackerError::ConfigError {
        message: format!("TOML parsing error: {}", e),
    })
}

/// Dashboard server settings, loaded from TOML. Every section is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub market_data: MarketDataConfig,
    pub defaults: DefaultsConfig,
    pub tickers: Vec<TickerEntry>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            market_data: MarketDataConfig::default(),
            defaults: DefaultsConfig::default(),
            tickers: default_tickers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub chart_base_url: String,
    pub cache_ttl_seconds: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            chart_base_url: DEFAULT_CHART_BASE_URL.to_string(),
            cache_ttl_seconds: 3600,
        }
    }
}

/// Initial selections offered by the dashboard page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub period: Period,
    pub macd: MacdPeriods,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerEntry {
    pub symbol: String,
    pub name: String,
}

impl TickerEntry {
    fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }
}

pub fn default_tickers() -> Vec<TickerEntry> {
    [
        ("AAPL", "Apple Inc."),
        ("MSFT", "Microsoft Corporation"),
        ("GOOGL", "Alphabet Inc."),
        ("AMZN", "Amazon.com, Inc."),
        ("META", "Meta Platforms, Inc."),
        ("TSLA", "Tesla, Inc."),
        ("NVDA", "NVIDIA Corporation"),
        ("JPM", "JPMorgan Chase & Co."),
        ("V", "Visa Inc."),
        ("JNJ", "Johnson & Johnson"),
        ("WMT", "Walmart Inc."),
        ("PG", "Procter & Gamble Company"),
    ]
    .iter()
    .map(|(symbol, name)| TickerEntry::new(symbol, name))
    .collect()
}

impl DashboardConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse_toml(content)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.market_data.cache_ttl_seconds)
    }

    pub fn company_name(&self, symbol: &str) -> Option<&str> {
        self.tickers
            .iter()
            .find(|t| t.symbol == symbol)
            .map(|t| t.name.as_str())
    }
}

impl Validate for DashboardConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;
        validation::validate_url("market_data.chart_base_url", &self.market_data.chart_base_url)?;

        if self.tickers.is_empty() {
            return Err(TrackerError::ValidationError {
                message: "at least one ticker must be configured".to_string(),
            });
        }
        for ticker in &self.tickers {
            validation::validate_ticker("tickers.symbol", &ticker.symbol)?;
        }

        self.defaults.macd.validate()
    }
}

/// Report delivery settings, loaded from TOML. Channels without a section
/// are not used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub discord: Option<DiscordConfig>,
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

impl ReportConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse_toml(content)
    }
}

impl Validate for ReportConfig {
    fn validate(&self) -> Result<()> {
        if let Some(discord) = &self.discord {
            validation::validate_url("discord.webhook_url", &discord.webhook_url)?;
        }
        if let Some(email) = &self.email {
            email.validate()?;
        }
        Ok(())
    }
}
