//! Interactive dashboard: JSON API plus a single page that renders the
//! Vega-Lite specs it returns.

pub mod cache;
pub mod error;
pub mod routes;

use crate::adapters::yahoo::YahooChartClient;
use crate::config::toml_config::DashboardConfig;
use crate::domain::ports::MarketDataSource;
use crate::utils::error::Result;
use axum::routing::get;
use axum::Router;
use cache::HistoryCache;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub market: Arc<dyn MarketDataSource>,
    pub cache: Arc<HistoryCache>,
}

impl AppState {
    pub fn new(config: DashboardConfig, market: Arc<dyn MarketDataSource>) -> Self {
        let cache = Arc::new(HistoryCache::new(config.cache_ttl()));
        Self {
            config: Arc::new(config),
            market,
            cache,
        }
    }

    /// State backed by the chart API at the configured base URL.
    pub fn from_config(config: DashboardConfig) -> Result<Self> {
        let market = YahooChartClient::new(config.market_data.chart_base_url.clone())?;
        Ok(Self::new(config, Arc::new(market)))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/healthz", get(routes::health))
        .route("/_stcore/health", get(routes::health))
        .route("/api/tickers", get(routes::tickers))
        .route("/api/periods", get(routes::periods))
        .route("/api/stocks/:ticker", get(routes::stock))
        .route("/api/stocks/:ticker/csv", get(routes::stock_csv))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl-C or SIGTERM.
pub async fn serve(state: AppState) -> Result<()> {
    let address = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Dashboard listening on http://{}", address);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Dashboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
