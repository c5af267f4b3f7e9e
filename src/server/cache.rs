use crate::domain::model::{Period, PriceHistory};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry {
    fetched_at: Instant,
    history: Arc<PriceHistory>,
}

/// Fetched histories keyed by ticker and period, each valid for `ttl`.
pub struct HistoryCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, Period), Entry>>,
}

impl HistoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, ticker: &str, period: Period) -> Option<Arc<PriceHistory>> {
        let entries = self.entries.read().await;
        entries
            .get(&(ticker.to_string(), period))
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.history))
    }

    pub async fn insert(
        &self,
        ticker: &str,
        period: Period,
        history: PriceHistory,
    ) -> Arc<PriceHistory> {
        let history = Arc::new(history);
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
        entries.insert(
            (ticker.to_string(), period),
            Entry {
                fetched_at: Instant::now(),
                history: Arc::clone(&history),
            },
        );
        history
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
