#[cfg(feature = "lambda")]
use crate::adapters::wikipedia::DEFAULT_WIKI_BASE_URL;
#[cfg(feature = "lambda")]
use crate::adapters::yahoo::DEFAULT_CHART_BASE_URL;
#[cfg(feature = "lambda")]
use crate::config::email::EmailConfig;
#[cfg(feature = "lambda")]
use crate::core::screener::DEFAULT_MY_STOCKS;
#[cfg(feature = "lambda")]
use crate::core::{ConfigProvider, Storage};
#[cfg(feature = "lambda")]
use crate::utils::error::{Result, TrackerError};
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use std::env;
#[cfg(feature = "lambda")]
use std::str::FromStr;
#[cfg(feature = "lambda")]
use std::time::Duration;

#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub s3_region: String,
    pub my_stocks: Vec<String>,
    pub chart_base_url: String,
    pub constituents_base_url: String,
    pub history_days: i64,
    pub cache_ttl_minutes: u64,
    pub pause_every: usize,
    pub pause_seconds: u64,
    /// Report delivery by email, enabled when `SMTP_SERVER` is set.
    pub email: Option<EmailConfig>,
}

#[cfg(feature = "lambda")]
fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| TrackerError::InvalidConfigValueError {
                field: key.to_string(),
                value: raw.clone(),
                reason: "not a valid number".to_string(),
            }),
    }
}

#[cfg(feature = "lambda")]
impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Builds the config from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let my_stocks = match lookup("MY_STOCKS") {
            Some(list) => list
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            None => DEFAULT_MY_STOCKS.iter().map(|t| t.to_string()).collect(),
        };

        Ok(Self {
            s3_bucket: lookup("S3_BUCKET").ok_or_else(|| TrackerError::MissingConfigError {
                field: "S3_BUCKET".to_string(),
            })?,
            s3_prefix: lookup("S3_PREFIX").unwrap_or_else(|| "stock-tracker".to_string()),
            s3_region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            my_stocks,
            chart_base_url: lookup("CHART_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CHART_BASE_URL.to_string()),
            constituents_base_url: lookup("WIKI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_WIKI_BASE_URL.to_string()),
            history_days: parse_or(&lookup, "HISTORY_DAYS", 90)?,
            cache_ttl_minutes: parse_or(&lookup, "CACHE_TTL_MINUTES", 60)?,
            pause_every: parse_or(&lookup, "PAUSE_EVERY", 50)?,
            pause_seconds: parse_or(&lookup, "PAUSE_SECONDS", 3)?,
            email: EmailConfig::from_lookup(&lookup)?,
        })
    }
}

#[cfg(feature = "lambda")]
impl ConfigProvider for LambdaConfig {
    fn output_path(&self) -> &str {
        &self.s3_prefix
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

#[cfg(feature = "lambda")]
impl crate::utils::validation::Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;
        validate_non_empty_string("s3_prefix", &self.s3_prefix)?;
        validate_aws_region("s3_region", &self.s3_region)?;
        validate_url("chart_base_url", &self.chart_base_url)?;
        validate_url("constituents_base_url", &self.constituents_base_url)?;
        for ticker in &self.my_stocks {
            validate_ticker("my_stocks", ticker)?;
        }
        validate_range("history_days", self.history_days, 30, 3650)?;
        validate_range("cache_ttl_minutes", self.cache_ttl_minutes, 0, 24 * 60)?;
        validate_range("pause_seconds", self.pause_seconds, 0, 60)?;
        if let Some(email) = &self.email {
            email.validate()?;
        }

        tracing::info!("Lambda configuration validation passed");
        Ok(())
    }
}

/// Objects under `<prefix>/` in a bucket.
#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    prefix: String,
}

#[cfg(feature = "lambda")]
impl S3Storage {
    pub fn new(client: S3Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    fn key(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }
}

#[cfg(feature = "lambda")]
fn s3_error(action: &str, e: impl std::fmt::Display) -> TrackerError {
    TrackerError::StorageError {
        message: format!("Failed to {} S3: {}", action, e),
    }
}

#[cfg(feature = "lambda")]
impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .send()
            .await
            .map_err(|e| s3_error("read from", aws_sdk_s3::error::DisplayErrorContext(e)))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| s3_error("collect data from", e))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| s3_error("write to", aws_sdk_s3::error::DisplayErrorContext(e)))?;

        tracing::debug!("Wrote s3://{}/{}", self.bucket, self.key(path));
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let list_prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        };

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&list_prefix)
            .into_paginator()
            .send();

        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page =
                page.map_err(|e| s3_error("list", aws_sdk_s3::error::DisplayErrorContext(e)))?;
            for object in page.contents() {
                let Some(name) = object.key().and_then(|k| k.strip_prefix(&list_prefix)) else {
                    continue;
                };
                if !name.is_empty() && !name.contains('/') {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }
}
