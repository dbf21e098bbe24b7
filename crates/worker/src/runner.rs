use std::time::Instant;

use forum_domain::clock::now_ms;
use forum_domain::metrics::MetricName;
use forum_domain::reconciliation::SweepReport;
use forum_infra::services::InteractionServices;
use tracing::{info, warn};

use crate::observability;

#[derive(Debug, Default)]
pub struct TickReport {
    pub sweeps: Vec<(MetricName, SweepReport)>,
    pub sweep_errors: usize,
    pub purged_view_windows: usize,
}

pub struct ReconcileRunner {
    services: InteractionServices,
}

impl ReconcileRunner {
    pub fn new(services: InteractionServices) -> Self {
        Self { services }
    }

    /// Counters with an authoritative source in the current wiring.
    pub fn swept_metrics(&self) -> Vec<MetricName> {
        MetricName::ALL
            .into_iter()
            .filter(|metric| self.services.reconciler.supports(*metric))
            .collect()
    }

    /// One maintenance pass: rebuild drifted counters, then drop expired
    /// view windows.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for metric in self.swept_metrics() {
            let started = Instant::now();
            match self.services.reconciler.sweep(metric).await {
                Ok(sweep) => {
                    observability::register_sweep(
                        metric.as_str(),
                        "ok",
                        sweep.scanned,
                        sweep.repaired,
                        sweep.failed,
                        started.elapsed().as_secs_f64() * 1000.0,
                    );
                    if sweep.repaired > 0 || sweep.failed > 0 {
                        info!(
                            metric = metric.as_str(),
                            scanned = sweep.scanned,
                            repaired = sweep.repaired,
                            failed = sweep.failed,
                            "reconciliation sweep finished"
                        );
                    }
                    report.sweeps.push((metric, sweep));
                }
                Err(err) => {
                    observability::register_sweep(
                        metric.as_str(),
                        "error",
                        0,
                        0,
                        0,
                        started.elapsed().as_secs_f64() * 1000.0,
                    );
                    warn!(metric = metric.as_str(), error = %err, "reconciliation sweep failed");
                    report.sweep_errors += 1;
                }
            }
        }

        match self.services.views.purge_expired().await {
            Ok(purged) => {
                observability::register_view_purge(purged);
                report.purged_view_windows = purged;
            }
            Err(err) => warn!(error = %err, "view window purge failed"),
        }

        observability::set_last_tick(now_ms());
        report
    }
}
