use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

// The recorder is process-global; every router built in this process shares it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the cache window gauge.
    pub fn init(cache_window_secs: u64) -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe_all();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();

        gauge!("news_cache_window_secs").set(cache_window_secs as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
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

fn describe_all() {
    describe_counter!("news_cache_hits_total", "Requests served from the snapshot cache.");
    describe_counter!(
        "news_cache_misses_total",
        "Requests that had to call the upstream provider."
    );
    describe_counter!("news_fetch_errors_total", "Upstream fetch failures.");
    describe_histogram!("news_fetch_ms", "Upstream fetch time in milliseconds.");
    describe_counter!(
        "news_publish_errors_total",
        "Snapshot writes that failed or timed out."
    );
    describe_counter!(
        "news_filter_fallback_total",
        "Requests answered with the unfiltered feed because filtering failed."
    );
    describe_counter!("news_items_served_total", "Feed items returned to callers.");
    describe_gauge!("news_cache_window_secs", "Configured snapshot cache window.");
}
