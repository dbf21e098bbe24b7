use std::sync::Arc;

use serde::Serialize;

use crate::DomainResult;
use crate::error::DomainError;
use crate::metrics::MetricName;
use crate::ports::content::ContentDirectory;
use crate::ports::metrics::MetricStore;
use crate::ports::relations::RelationLedger;
use crate::relations::RelationKind;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub content_id: i64,
    pub metric: MetricName,
    pub previous: i64,
    pub value: i64,
    pub changed: bool,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub repaired: usize,
    pub failed: usize,
}

/// Rebuilds cached counters from their authoritative sources.
#[derive(Clone)]
pub struct ReconciliationJob {
    ledger: Arc<dyn RelationLedger>,
    metrics: Arc<dyn MetricStore>,
    directory: Option<Arc<dyn ContentDirectory>>,
}

impl ReconciliationJob {
    pub fn new(ledger: Arc<dyn RelationLedger>, metrics: Arc<dyn MetricStore>) -> Self {
        Self {
            ledger,
            metrics,
            directory: None,
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn ContentDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub async fn reconcile(
        &self,
        content_id: i64,
        metric: MetricName,
    ) -> DomainResult<ReconcileOutcome> {
        let content_id = crate::util::require_content_id(content_id)?;
        let value = self.authoritative_value(content_id, metric).await?;
        let previous = self.metrics.get(content_id, metric).await?;
        let changed = previous != value;
        if changed {
            self.metrics.set(content_id, metric, value).await?;
            tracing::info!(
                content_id,
                metric = metric.as_str(),
                previous,
                value,
                "cached metric repaired"
            );
        }
        Ok(ReconcileOutcome {
            content_id,
            metric,
            previous,
            value,
            changed,
        })
    }

    pub async fn reconcile_many(
        &self,
        content_ids: &[i64],
        metric: MetricName,
    ) -> DomainResult<Vec<ReconcileOutcome>> {
        let mut outcomes = Vec::with_capacity(content_ids.len());
        for content_id in crate::util::normalize_content_ids(content_ids) {
            outcomes.push(self.reconcile(content_id, metric).await?);
        }
        Ok(outcomes)
    }

    /// Seeds the listed counters with zero for freshly created content.
    pub async fn initialize(&self, content_id: i64, metrics: &[MetricName]) -> DomainResult<()> {
        let content_id = crate::util::require_content_id(content_id)?;
        for metric in metrics {
            self.metrics.set(content_id, *metric, 0).await?;
        }
        Ok(())
    }

    /// Reconciles every content id the metric store holds a record for.
    /// Individual failures are counted and skipped.
    pub async fn sweep(&self, metric: MetricName) -> DomainResult<SweepReport> {
        let content_ids = self.metrics.content_ids(metric).await?;
        let mut report = SweepReport::default();
        for content_id in content_ids {
            report.scanned += 1;
            match self.reconcile(content_id, metric).await {
                Ok(outcome) if outcome.changed => report.repaired += 1,
                Ok(_) => {}
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        content_id,
                        metric = metric.as_str(),
                        error = %err,
                        "metric reconciliation failed"
                    );
                }
            }
        }
        Ok(report)
    }

    pub fn supports(&self, metric: MetricName) -> bool {
        match metric {
            MetricName::LikeCount => true,
            MetricName::ReplyCount => self.directory.is_some(),
            MetricName::ViewCount => false,
        }
    }

    async fn authoritative_value(&self, content_id: i64, metric: MetricName) -> DomainResult<i64> {
        match metric {
            MetricName::LikeCount => {
                self.ledger
                    .count_by_content(content_id, RelationKind::Like)
                    .await
            }
            MetricName::ReplyCount => match &self.directory {
                Some(directory) => directory.count_replies(content_id).await,
                None => Err(DomainError::InvalidArgument(
                    "reply_count needs a content directory to reconcile".to_string(),
                )),
            },
            MetricName::ViewCount => Err(DomainError::InvalidArgument(
                "view_count has no authoritative source".to_string(),
            )),
        }
    }
}
