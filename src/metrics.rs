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
    /// Install the Prometheus recorder once per process and publish the sweep interval.
    /// Later calls reuse the installed recorder.
    pub fn init(sweep_interval_secs: u64) -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new()
                    .install_recorder()
                    .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();

        gauge!("verdict_cache_sweep_interval_secs").set(sweep_interval_secs as f64);

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

fn describe() {
    describe_counter!("reviews_analyzed_total", "Reviews that produced a verdict.");
    describe_counter!("reviews_flagged_total", "Verdicts with is_fake = true.");
    describe_counter!(
        "review_record_failures_total",
        "Records rejected at validation (per-record InputError)."
    );
    describe_counter!("verdict_cache_hits_total", "Verdict cache hits.");
    describe_counter!("verdict_cache_misses_total", "Verdict cache misses.");
    describe_counter!(
        "verdict_cache_errors_total",
        "Verdict cache operations that failed open."
    );
    describe_counter!("verdict_cache_sweeps_total", "Completed sweeper runs.");
    describe_counter!(
        "rate_limited_total",
        "Requests rejected by admission control, by policy."
    );
    describe_counter!(
        "classifier_unavailable_total",
        "Classifier calls that produced no signal."
    );
    describe_histogram!("analyze_duration_ms", "Batch analysis time in milliseconds.");
    describe_gauge!(
        "verdict_cache_sweep_interval_secs",
        "Configured sweep interval."
    );
}
