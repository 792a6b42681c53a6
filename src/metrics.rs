// src/metrics.rs
use std::net::SocketAddr;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on the scrape endpoint).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cycles_total", "Completed ingestion cycles.");
        describe_counter!("cycle_errors_total", "Cycles that ended in an error.");
        describe_histogram!("cycle_duration_ms", "Cycle wall time in milliseconds.");
        describe_gauge!("cycle_success_rate", "New documents / processed items in the last cycle.");
        describe_gauge!("cycle_last_run_ts", "Unix ts when the last cycle finished.");

        describe_counter!("fetch_items_total", "Items handed out by the fetcher, by kind.");
        describe_counter!("fetch_source_errors_total", "Sources that failed during a fetch.");
        describe_histogram!("reddit_request_ms", "Reddit listing request time in milliseconds.");
        describe_counter!("reddit_http_errors_total", "Failed Reddit HTTP requests.");

        describe_counter!("items_processed_total", "Items seen by the orchestrator, by kind.");
        describe_counter!("items_filtered_total", "Items dropped by the content filter, by reason.");
        describe_counter!("store_upserts_total", "Successful upserts, by outcome.");
        describe_counter!("store_errors_total", "Upserts that failed.");

        describe_counter!("buffer_append_errors_total", "Failed buffer appends.");
        describe_counter!("buffer_unavailable_total", "Cycles run without the buffer after a failed probe.");

        describe_counter!("summarizer_fallback_total", "Summaries replaced by truncation.");
        describe_counter!("classifier_fallback_total", "Single labels replaced by the default.");
        describe_counter!("classifier_batch_fallback_total", "Whole batches replaced by the default.");
    });
}

/// Installs the Prometheus recorder with an HTTP listener on `addr`.
/// Must run inside a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus exporter on {addr}: {e}"))?;
    ensure_metrics_described();
    tracing::info!(target: "metrics", %addr, "prometheus exporter listening");
    Ok(())
}
