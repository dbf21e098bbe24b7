use std::net::SocketAddr;

use anyhow::Result;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

const RECONCILE_RUNS_TOTAL: &str = "forum_worker_reconcile_runs_total";
const RECONCILE_SCANNED_TOTAL: &str = "forum_worker_metrics_scanned_total";
const RECONCILE_REPAIRED_TOTAL: &str = "forum_worker_metrics_repaired_total";
const RECONCILE_FAILED_TOTAL: &str = "forum_worker_metrics_failed_total";
const SWEEP_DURATION_MS: &str = "forum_worker_sweep_duration_ms";
const VIEW_WINDOWS_PURGED_TOTAL: &str = "forum_worker_view_windows_purged_total";
const LAST_TICK_GAUGE: &str = "forum_worker_last_tick_unix_ms";

pub fn init_metrics(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}

pub fn register_sweep(
    metric: &str,
    result: &str,
    scanned: usize,
    repaired: usize,
    failed: usize,
    duration_ms: f64,
) {
    counter!(
        RECONCILE_RUNS_TOTAL,
        "metric" => metric.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
    counter!(RECONCILE_SCANNED_TOTAL, "metric" => metric.to_string()).increment(scanned as u64);
    counter!(RECONCILE_REPAIRED_TOTAL, "metric" => metric.to_string()).increment(repaired as u64);
    counter!(RECONCILE_FAILED_TOTAL, "metric" => metric.to_string()).increment(failed as u64);

    histogram!(SWEEP_DURATION_MS, "metric" => metric.to_string()).record(duration_ms.max(0.0));
}

pub fn register_view_purge(purged: usize) {
    counter!(VIEW_WINDOWS_PURGED_TOTAL).increment(purged as u64);
}

pub fn set_last_tick(now_ms: i64) {
    gauge!(LAST_TICK_GAUGE).set(now_ms.max(0) as f64);
}
