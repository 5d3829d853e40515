// src/lib.rs
// Public library surface for the service binary, the one-shot snapshot tool, and integration tests.

pub mod accounts;
pub mod api;
pub mod config;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::NewsConfig;
pub use crate::pipeline::{NewsPipeline, PublishPolicy};

use axum::Router;
use tracing::info;

/// Build the full application router from configuration on disk and the environment.
///
/// Loads `NewsConfig`, installs the Prometheus recorder and merges `/metrics`
/// into the API router.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = NewsConfig::load_default()?;
    let metrics = crate::metrics::Metrics::init(cfg.cache.window_secs)?;
    let state = AppState::from_config(&cfg)?;
    info!(
        provider = %cfg.provider.url,
        window_secs = cfg.cache.window_secs,
        "news-galore router ready"
    );
    Ok(router(state).merge(metrics.router()))
}
