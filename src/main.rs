//! Employee stock monitor: binary entrypoint.
//! Boots the Axum HTTP server with storage, cache and market feed wired in.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kt_stock_monitor::{build_app, MonitorConfig};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - MONITOR_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("MONITOR_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kt_stock_monitor=info,storage=info,report=info,market=info,api=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let config = MonitorConfig::from_env()?;
    tracing::info!(
        data_root = %config.data_root.display(),
        report_root = %config.report_root.display(),
        feed = ?config.market_feed,
        "monitor config loaded"
    );

    let router = build_app(config).await?;

    Ok(router.into())
}
