// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod finance;
pub mod market;
pub mod metrics;
pub mod news;
pub mod parse;
pub mod report;
pub mod storage;
pub mod trend;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{aggregate, ParsedData};
pub use crate::api::{router, AppState};
pub use crate::config::MonitorConfig;
pub use crate::parse::{parse_dart, parse_forum, parse_market, parse_news};
pub use crate::trend::{generate_trend_prediction, project_next_close};

use tracing::info;

/// Build the full application for `config`: prepare the storage roots, seed
/// sample data when enabled, and return the router.
pub async fn build_app(config: MonitorConfig) -> anyhow::Result<axum::Router> {
    let state = AppState::from_config(config);
    state.store.ensure_roots().await?;

    if state.config.bootstrap_sample_data {
        let seeded = bootstrap::bootstrap_today(&state.store).await?;
        info!(seeded, "sample data bootstrap checked");
    }

    Ok(router(state))
}

/// [`build_app`] with configuration resolved from file and environment.
pub async fn app() -> anyhow::Result<axum::Router> {
    build_app(MonitorConfig::from_env()?).await
}
