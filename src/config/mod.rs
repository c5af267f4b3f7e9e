#[cfg(feature = "cli")]
pub mod cli;
pub mod deploy;
pub mod email;
pub mod lambda;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::adapters::wikipedia::DEFAULT_WIKI_BASE_URL;
#[cfg(feature = "cli")]
use crate::adapters::yahoo::DEFAULT_CHART_BASE_URL;
#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "cli")]
use std::time::Duration;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "stock-tracker")]
#[command(about = "Weekly and monthly stock screener for the S&P 500 and NASDAQ-100")]
pub struct CliConfig {
    #[arg(long, default_value = "./output")]
    pub output_path: String,

    /// Personal watchlist, comma separated.
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "SPX,SPY,VIX,ABBV,LMT,EUAD,PLTR,CVNA,KMX"
    )]
    pub my_stocks: Vec<String>,

    #[arg(long, default_value = DEFAULT_CHART_BASE_URL)]
    pub chart_base_url: String,

    #[arg(long, default_value = DEFAULT_WIKI_BASE_URL)]
    pub constituents_base_url: String,

    /// Calendar days of history fetched per ticker.
    #[arg(long, default_value = "90")]
    pub history_days: i64,

    /// Reuse a snapshot younger than this many minutes.
    #[arg(long, default_value = "60")]
    pub cache_ttl_minutes: u64,

    /// Pause after this many successful fetches (0 disables throttling).
    #[arg(long, default_value = "50")]
    pub pause_every: usize,

    #[arg(long, default_value = "3")]
    pub pause_seconds: u64,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory between phases")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn my_stocks(&self) -> &[String] {
        &self.my_stocks
    }

    fn chart_base_url(&self) -> &str {
        &self.chart_base_url
    }

    fn constituents_base_url(&self) -> &str {
        &self.constituents_base_url
    }

    fn history_days(&self) -> i64 {
        self.history_days
    }

    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    fn pause_every(&self) -> usize {
        self.pause_every
    }

    fn pause_duration(&self) -> Duration {
        Duration::from_secs(self.pause_seconds)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_url("chart_base_url", &self.chart_base_url)?;
        validation::validate_url("constituents_base_url", &self.constituents_base_url)?;
        for ticker in &self.my_stocks {
            validation::validate_ticker("my_stocks", ticker)?;
        }
        validation::validate_range("history_days", self.history_days, 30, 3650)?;
        validation::validate_range("cache_ttl_minutes", self.cache_ttl_minutes, 0, 24 * 60)?;
        validation::validate_range("pause_seconds", self.pause_seconds, 0, 60)?;

        tracing::debug!("CLI configuration validation passed");
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::parse_from(["stock-tracker"]);
        assert_eq!(config.my_stocks.len(), 9);
        assert_eq!(config.my_stocks[0], "SPX");
        assert_eq!(config.history_days(), 90);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.pause_every(), 50);
        assert_eq!(config.pause_duration(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_watchlist_override() {
        let config = CliConfig::parse_from(["stock-tracker", "--my-stocks", "AAPL,BRK.B"]);
        assert_eq!(config.my_stocks(), &["AAPL".to_string(), "BRK.B".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = CliConfig::parse_from(["stock-tracker", "--history-days", "5"]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from(["stock-tracker", "--my-stocks", "not a ticker"]);
        assert!(config.validate().is_err());
    }
}
