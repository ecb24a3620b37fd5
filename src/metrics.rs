use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the
    /// parsed-data cache TTL as a static gauge.
    pub fn init(cache_ttl_secs: u64) -> Self {
        let handle = HANDLE
            .get_or_init(|| {
                let handle = PrometheusBuilder::new()
                    .install_recorder()
                    .expect("prometheus: install recorder");
                describe();
                handle
            })
            .clone();

        gauge!("parsed_cache_ttl_secs").set(cache_ttl_secs as f64);

        Self { handle }
    }

    /// `/metrics` in the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("parsed_cache_hits_total", "Parsed-data cache hits");
    describe_counter!("parsed_cache_misses_total", "Parsed-data cache misses (absent or expired)");
    describe_gauge!("parsed_cache_ttl_secs", "Configured parsed-data cache TTL");
    describe_counter!("aggregate_sources_total", "Source files folded into aggregates");
    describe_histogram!("aggregate_parse_ms", "Time spent aggregating one date");
    describe_counter!("market_fetch_errors_total", "Market feed requests that failed after retries");
    describe_counter!("reports_generated_total", "Markdown reports written");
    describe_counter!("uploads_total", "Accepted source uploads");
    describe_counter!("news_fetch_errors_total", "News search queries that failed on every endpoint");
    describe_counter!("news_items_collected_total", "Headlines stored by the news collector");
    describe_histogram!("news_parse_ms", "Time spent parsing one RSS body");
}
