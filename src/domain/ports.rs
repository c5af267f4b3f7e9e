use crate::domain::model::{HistoryRange, MarketIndex, PriceHistory};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// File names directly under the storage root.
    fn list_files(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn output_path(&self) -> &str;
    fn my_stocks(&self) -> &[String];
    fn chart_base_url(&self) -> &str;
    fn constituents_base_url(&self) -> &str;
    fn history_days(&self) -> i64;
    fn cache_ttl(&self) -> Duration;
    fn pause_every(&self) -> usize;
    fn pause_duration(&self) -> Duration;
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn history(&self, ticker: &str, range: HistoryRange) -> Result<PriceHistory>;
}

#[async_trait]
pub trait ConstituentSource: Send + Sync {
    async fn constituents(&self, index: MarketIndex) -> Result<Vec<String>>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send;
    type Output: Send + Sync;

    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Output>;
    /// Persists the output and returns where it went.
    async fn load(&self, output: &Self::Output) -> Result<String>;
}
