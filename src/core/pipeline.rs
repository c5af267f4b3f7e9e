use crate::adapters::{WikipediaConstituents, YahooChartClient};
use crate::core::screener::{
    self, actionables_file_name, bundle_file_name, fresh_snapshot, stocks_file_name, Thresholds,
    SNAPSHOT_TIMESTAMP_FORMAT,
};
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{
    CachedSnapshot, Extracted, HistoryRange, MarketIndex, ScreenResult, StockSummary, Universe,
};
use crate::domain::ports::{ConstituentSource, MarketDataSource};
use crate::utils::error::{Result, TrackerError};
use chrono::{Local, TimeDelta};
use serde_json::json;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use zip::write::{FileOptions, ZipWriter};

struct GroupFetch {
    rows: Vec<StockSummary>,
    pauses: usize,
}

/// Weekly/monthly screener over the S&P 500, NASDAQ-100 and a personal watchlist.
pub struct ScreenerPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    market: Arc<dyn MarketDataSource>,
    constituents: Arc<dyn ConstituentSource>,
    thresholds: Thresholds,
}

impl<S: Storage, C: ConfigProvider> ScreenerPipeline<S, C> {
    /// Pipeline backed by the chart API and Wikipedia at the configured URLs.
    pub fn new(storage: S, config: C) -> Result<Self> {
        let market = Arc::new(YahooChartClient::new(config.chart_base_url())?);
        let constituents = Arc::new(WikipediaConstituents::new(config.constituents_base_url())?);
        Ok(Self::with_sources(storage, config, market, constituents))
    }

    pub fn with_sources(
        storage: S,
        config: C,
        market: Arc<dyn MarketDataSource>,
        constituents: Arc<dyn ConstituentSource>,
    ) -> Self {
        Self {
            storage,
            config,
            market,
            constituents,
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    async fn cached_snapshot(&self) -> Result<Option<CachedSnapshot>> {
        let files = self.storage.list_files().await?;
        let ttl = TimeDelta::from_std(self.config.cache_ttl()).map_err(|e| {
            TrackerError::InvalidConfigValueError {
                field: "cache_ttl".to_string(),
                value: format!("{:?}", self.config.cache_ttl()),
                reason: e.to_string(),
            }
        })?;

        let Some(timestamp) = fresh_snapshot(&files, Local::now().naive_local(), ttl) else {
            return Ok(None);
        };

        let stocks_file = stocks_file_name(&timestamp);
        let stocks = screener::decode_csv(&self.storage.read_file(&stocks_file).await?)?;
        let actionables_file = actionables_file_name(&timestamp);
        let actionables = if files.contains(&actionables_file) {
            Some(screener::decode_csv(&self.storage.read_file(&actionables_file).await?)?)
        } else {
            None
        };

        Ok(Some(CachedSnapshot {
            timestamp,
            stocks,
            actionables,
        }))
    }

    /// Fetches and summarizes every ticker in order, skipping failures.
    /// After every `pause_every` successful fetches within the group, waits
    /// `pause_duration` before the next request; each group starts a fresh count.
    async fn fetch_group(&self, tickers: &[String], index: MarketIndex) -> GroupFetch {
        let range = HistoryRange::Days(self.config.history_days());
        let pause_every = self.config.pause_every();
        let mut group = GroupFetch {
            rows: Vec::with_capacity(tickers.len()),
            pauses: 0,
        };
        let mut since_pause = 0;

        tracing::info!("Fetching {} {} tickers", tickers.len(), index);
        for ticker in tickers {
            if pause_every > 0 && since_pause == pause_every {
                tracing::debug!(
                    "Fetched {} {} tickers, pausing for {:?}",
                    group.rows.len(),
                    index,
                    self.config.pause_duration()
                );
                tokio::time::sleep(self.config.pause_duration()).await;
                group.pauses += 1;
                since_pause = 0;
            }

            let history = match self.market.history(ticker, range).await {
                Ok(history) => history,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", ticker, e);
                    continue;
                }
            };

            match StockSummary::from_history(&history, index) {
                Some(row) => {
                    group.rows.push(row);
                    since_pause += 1;
                }
                None => tracing::warn!("No data found for {}", ticker),
            }
        }
        group
    }

    fn bundle(&self, output: &ScreenResult) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        zip.start_file::<_, ()>("stocks.csv", FileOptions::default())?;
        zip.write_all(&screener::encode_csv(&output.stocks)?)?;

        zip.start_file::<_, ()>("actionables.csv", FileOptions::default())?;
        zip.write_all(&screener::encode_csv(&output.actionables)?)?;

        zip.start_file::<_, ()>("trading_lists.json", FileOptions::default())?;
        let lists = json!({"buy": output.buy_list, "sell": output.sell_list});
        zip.write_all(serde_json::to_string_pretty(&lists)?.as_bytes())?;

        Ok(zip.finish()?.into_inner())
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ScreenerPipeline<S, C> {
    type Extracted = Extracted;
    type Output = ScreenResult;

    async fn extract(&self) -> Result<Extracted> {
        if let Some(cached) = self.cached_snapshot().await? {
            tracing::info!(
                "Reusing snapshot {} ({} stocks)",
                cached.timestamp,
                cached.stocks.len()
            );
            return Ok(Extracted::Cached(cached));
        }

        let sp500_tickers = self.constituents.constituents(MarketIndex::Sp500).await?;
        let in_sp500: HashSet<&str> = sp500_tickers.iter().map(String::as_str).collect();
        let nasdaq_tickers: Vec<String> = self
            .constituents
            .constituents(MarketIndex::Nasdaq100)
            .await?
            .into_iter()
            .filter(|t| !in_sp500.contains(t.as_str()))
            .collect();

        let universe = Universe {
            sp500: self.fetch_group(&sp500_tickers, MarketIndex::Sp500).await.rows,
            nasdaq100: self
                .fetch_group(&nasdaq_tickers, MarketIndex::Nasdaq100)
                .await
                .rows,
            my_stocks: self
                .fetch_group(self.config.my_stocks(), MarketIndex::MyStocks)
                .await
                .rows,
        };
        let fetched = universe.sp500.len() + universe.nasdaq100.len() + universe.my_stocks.len();

        if fetched == 0 {
            return Err(TrackerError::ProcessingError {
                message: "no ticker returned price history".to_string(),
            });
        }
        tracing::info!("Fetched history for {} tickers", fetched);

        Ok(Extracted::Fresh(universe))
    }

    async fn transform(&self, data: Extracted) -> Result<ScreenResult> {
        let (timestamp, stocks, cached_actionables, from_cache) = match data {
            Extracted::Fresh(universe) => (
                Local::now().format(SNAPSHOT_TIMESTAMP_FORMAT).to_string(),
                screener::merge_universe(universe, self.config.my_stocks()),
                None,
                false,
            ),
            Extracted::Cached(snapshot) => {
                (snapshot.timestamp, snapshot.stocks, snapshot.actionables, true)
            }
        };

        let write_actionables = cached_actionables.is_none();
        let actionables = cached_actionables
            .unwrap_or_else(|| screener::actionables(&stocks, &self.thresholds));
        let (buy_list, sell_list) = screener::trading_lists(&actionables, &self.thresholds);

        tracing::info!(
            "{} stocks, {} actionable ({} buy, {} sell)",
            stocks.len(),
            actionables.len(),
            buy_list.len(),
            sell_list.len()
        );

        Ok(ScreenResult {
            timestamp,
            stocks,
            actionables,
            buy_list,
            sell_list,
            from_cache,
            write_actionables,
        })
    }

    async fn load(&self, output: &ScreenResult) -> Result<String> {
        if !output.from_cache {
            let name = stocks_file_name(&output.timestamp);
            self.storage
                .write_file(&name, &screener::encode_csv(&output.stocks)?)
                .await?;
            tracing::debug!("Wrote {}", name);
        }

        if output.write_actionables {
            let name = actionables_file_name(&output.timestamp);
            self.storage
                .write_file(&name, &screener::encode_csv(&output.actionables)?)
                .await?;
            tracing::debug!("Wrote {}", name);
        }

        let bundle = self.bundle(output)?;
        let name = bundle_file_name(&output.timestamp);
        tracing::debug!("Writing ZIP bundle ({} bytes) to storage", bundle.len());
        self.storage.write_file(&name, &bundle).await?;

        Ok(format!(
            "{}/{}",
            self.config.output_path().trim_end_matches('/'),
            name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{PriceBar, PriceHistory};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }

        async fn names(&self) -> Vec<String> {
            let mut names: Vec<String> = self.files.lock().await.keys().cloned().collect();
            names.sort();
            names
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                TrackerError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn list_files(&self) -> Result<Vec<String>> {
            Ok(self.files.lock().await.keys().cloned().collect())
        }
    }

    struct MockConfig {
        my_stocks: Vec<String>,
        pause_every: usize,
        pause_duration: Duration,
    }

    impl MockConfig {
        fn new(my_stocks: &[&str]) -> Self {
            Self {
                my_stocks: my_stocks.iter().map(|s| s.to_string()).collect(),
                pause_every: 2,
                pause_duration: Duration::from_millis(1),
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn output_path(&self) -> &str {
            "test_output"
        }

        fn my_stocks(&self) -> &[String] {
            &self.my_stocks
        }

        fn chart_base_url(&self) -> &str {
            "http://localhost"
        }

        fn constituents_base_url(&self) -> &str {
            "http://localhost"
        }

        fn history_days(&self) -> i64 {
            90
        }

        fn cache_ttl(&self) -> Duration {
            Duration::from_secs(3600)
        }

        fn pause_every(&self) -> usize {
            self.pause_every
        }

        fn pause_duration(&self) -> Duration {
            self.pause_duration
        }
    }

    /// Linear price series per ticker; tickers not listed have no data.
    struct FakeMarket {
        slopes: HashMap<&'static str, f64>,
    }

    #[async_trait]
    impl MarketDataSource for FakeMarket {
        async fn history(&self, ticker: &str, _range: HistoryRange) -> Result<PriceHistory> {
            let slope = self.slopes.get(ticker).ok_or_else(|| TrackerError::NoDataError {
                ticker: ticker.to_string(),
            })?;
            let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
            let bars = (0..30)
                .map(|i| {
                    let close = 100.0 + slope * i as f64;
                    PriceBar {
                        date: start + chrono::Days::new(i),
                        open: close,
                        high: close,
                        low: close,
                        close,
                        volume: 1_000,
                    }
                })
                .collect();
            Ok(PriceHistory {
                ticker: ticker.to_string(),
                bars,
            })
        }
    }

    struct FakeConstituents;

    #[async_trait]
    impl ConstituentSource for FakeConstituents {
        async fn constituents(&self, index: MarketIndex) -> Result<Vec<String>> {
            Ok(match index {
                MarketIndex::Sp500 => {
                    vec!["AAPL".into(), "MSFT".into(), "ABBV".into(), "GONE".into()]
                }
                MarketIndex::Nasdaq100 => vec!["AAPL".into(), "ASML".into()],
                MarketIndex::MyStocks => vec![],
            })
        }
    }

    fn pipeline(storage: MockStorage) -> ScreenerPipeline<MockStorage, MockConfig> {
        let market = FakeMarket {
            slopes: HashMap::from([
                ("AAPL", -1.5),
                ("MSFT", 0.1),
                ("ABBV", 3.0),
                ("ASML", 5.0),
            ]),
        };
        ScreenerPipeline::with_sources(
            storage,
            MockConfig::new(&["ABBV"]),
            Arc::new(market),
            Arc::new(FakeConstituents),
        )
    }

    fn throttled_pipeline(pause_every: usize) -> ScreenerPipeline<MockStorage, MockConfig> {
        let mut config = MockConfig::new(&["ABBV"]);
        config.pause_every = pause_every;
        config.pause_duration = Duration::from_secs(3);
        let market = FakeMarket {
            slopes: HashMap::from([
                ("AAPL", 1.0),
                ("MSFT", 1.0),
                ("ABBV", 1.0),
                ("ASML", 1.0),
                ("NVDA", 1.0),
            ]),
        };
        ScreenerPipeline::with_sources(
            MockStorage::new(),
            config,
            Arc::new(market),
            Arc::new(FakeConstituents),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_group_pauses_after_every_n_successes() {
        let pipeline = throttled_pipeline(2);
        let tickers: Vec<String> = ["AAPL", "MSFT", "GONE", "ABBV", "ASML", "NVDA"]
            .iter()
            .map(|t| t.to_string())
            .collect();

        let start = tokio::time::Instant::now();
        let group = pipeline.fetch_group(&tickers, MarketIndex::Sp500).await;

        assert_eq!(group.rows.len(), 5);
        // before GONE and before NVDA; the failed GONE does not count
        assert_eq!(group.pauses, 2);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_group_without_throttling() {
        let pipeline = throttled_pipeline(0);
        let tickers: Vec<String> = ["AAPL", "MSFT", "ABBV", "ASML", "NVDA"]
            .iter()
            .map(|t| t.to_string())
            .collect();

        let start = tokio::time::Instant::now();
        let group = pipeline.fetch_group(&tickers, MarketIndex::Sp500).await;

        assert_eq!(group.rows.len(), 5);
        assert_eq!(group.pauses, 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_count_restarts_for_each_index() {
        let pipeline = throttled_pipeline(2);

        let start = tokio::time::Instant::now();
        let Extracted::Fresh(universe) = pipeline.extract().await.unwrap() else {
            panic!("expected a fresh fetch");
        };

        // S&P 500: AAPL, MSFT, pause, ABBV, GONE. NASDAQ-100 and my stocks
        // hold one ticker each and never reach the threshold.
        assert_eq!(universe.sp500.len(), 3);
        assert_eq!(universe.nasdaq100.len(), 1);
        assert_eq!(universe.my_stocks.len(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_extract_fresh_universe_skips_missing_tickers() {
        let pipeline = pipeline(MockStorage::new());

        let Extracted::Fresh(universe) = pipeline.extract().await.unwrap() else {
            panic!("expected a fresh fetch");
        };

        let sp500: Vec<&str> = universe.sp500.iter().map(|s| s.ticker.as_str()).collect();
        let nasdaq: Vec<&str> = universe.nasdaq100.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(sp500, vec!["AAPL", "MSFT", "ABBV"]);
        assert_eq!(nasdaq, vec!["ASML"]);
        assert_eq!(universe.my_stocks.len(), 1);
        assert_eq!(universe.my_stocks[0].index, MarketIndex::MyStocks);
    }

    #[tokio::test]
    async fn test_transform_merges_and_builds_trading_lists() {
        let pipeline = pipeline(MockStorage::new());
        let extracted = pipeline.extract().await.unwrap();
        let result = pipeline.transform(extracted).await.unwrap();

        let tickers: Vec<&str> = result.stocks.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "ABBV", "ASML", "MSFT"]);
        let abbv = result.stocks.iter().find(|s| s.ticker == "ABBV").unwrap();
        assert_eq!(abbv.index, MarketIndex::MyStocks);

        // ASML: +25 over the week and up on the month -> actionable sell candidate
        let actionable: Vec<&str> = result.actionables.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(actionable, vec!["ABBV", "ASML"]);
        let sell: Vec<&str> = result.sell_list.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(sell, vec!["ASML", "ABBV"]);
        assert!(result.buy_list.is_empty());
        assert!(!result.from_cache);
        assert!(result.write_actionables);
    }

    #[tokio::test]
    async fn test_load_writes_snapshots_and_bundle() {
        let storage = MockStorage::new();
        let pipeline = pipeline(storage.clone());

        let extracted = pipeline.extract().await.unwrap();
        let result = pipeline.transform(extracted).await.unwrap();
        let output_path = pipeline.load(&result).await.unwrap();

        let bundle_name = format!("screener_{}.zip", result.timestamp);
        assert_eq!(output_path, format!("test_output/{}", bundle_name));
        assert_eq!(
            storage.names().await,
            vec![
                format!("actionables_{}.csv", result.timestamp),
                bundle_name.clone(),
                format!("stocks_{}.csv", result.timestamp),
            ]
        );

        let zip_bytes = storage.get_file(&bundle_name).await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["actionables.csv", "stocks.csv", "trading_lists.json"]);

        let lists: serde_json::Value = {
            let mut file = archive.by_name("trading_lists.json").unwrap();
            let mut content = String::new();
            std::io::Read::read_to_string(&mut file, &mut content).unwrap();
            serde_json::from_str(&content).unwrap()
        };
        assert_eq!(lists["sell"][0]["Ticker"], "ASML");
    }

    #[tokio::test]
    async fn test_fresh_snapshot_is_reused() {
        let storage = MockStorage::new();
        let timestamp = Local::now().format(SNAPSHOT_TIMESTAMP_FORMAT).to_string();
        let cached = vec![StockSummary {
            ticker: "NVDA".to_string(),
            index: MarketIndex::Nasdaq100,
            current_price: 120.0,
            weekly_price_change: -15.0,
            weekly_percentage_change: -11.11,
            monthly_price_change: 4.0,
            monthly_percentage_change: 3.45,
        }];
        storage
            .write_file(
                &stocks_file_name(&timestamp),
                &screener::encode_csv(&cached).unwrap(),
            )
            .await
            .unwrap();

        let pipeline = pipeline(storage.clone());
        let extracted = pipeline.extract().await.unwrap();
        assert!(matches!(extracted, Extracted::Cached(ref c) if c.actionables.is_none()));

        let result = pipeline.transform(extracted).await.unwrap();
        assert!(result.from_cache);
        assert_eq!(result.timestamp, timestamp);
        assert_eq!(result.buy_list[0].ticker, "NVDA");

        pipeline.load(&result).await.unwrap();
        // missing actionables snapshot is filled in under the cached timestamp
        assert!(storage
            .get_file(&actionables_file_name(&timestamp))
            .await
            .is_some());
    }
}
