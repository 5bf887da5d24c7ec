// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod ratelimit;
pub mod review;
pub mod sentiment;
pub mod service;
pub mod signals;
pub mod sweeper;
pub mod telemetry;
pub mod verdict;

pub use crate::aggregator::VerdictAggregator;
pub use crate::api::router;
pub use crate::review::{Review, ReviewRecord, ReviewerHistory};
pub use crate::signals::Signal;
pub use crate::verdict::{BatchReport, Verdict};

use axum::Router;
use tracing::info;

use crate::api::AppState;
use crate::config::AppConfig;

/// Build the full application router from `config/truetale.toml` and the environment.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load()?;
    app_with_config(&cfg)
}

/// Build the full application router (API + `/metrics`) from an explicit config.
pub fn app_with_config(cfg: &AppConfig) -> anyhow::Result<Router> {
    let metrics = crate::metrics::Metrics::init(cfg.cache.sweep_interval().as_secs())?;
    let state = AppState::from_config(cfg)?;
    info!(
        sweep_interval_secs = cfg.cache.sweep_interval().as_secs(),
        client_limit = cfg.rate_limit.client_limit,
        fetch_per_minute = cfg.rate_limit.fetch_per_minute,
        classifier = state.service.has_classifier(),
        "truetale analyzer ready"
    );
    Ok(router(state).merge(metrics.router()))
}
