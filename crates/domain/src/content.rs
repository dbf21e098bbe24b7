use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::metrics::{ContentMetrics, MetricName};
use crate::ports::metrics::MetricStore;
use crate::reconciliation::ReconciliationJob;
use crate::util::{normalize_content_ids, require_content_id};
use crate::views::ViewDeduplicator;

const POST_METRICS: [MetricName; 3] = [
    MetricName::ViewCount,
    MetricName::LikeCount,
    MetricName::ReplyCount,
];
const REPLY_METRICS: [MetricName; 1] = [MetricName::LikeCount];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Reply,
}

/// Counter bookkeeping around content lifecycle events and page views.
///
/// Existence and type checks on the content itself happen in the content
/// storage layer before these calls are made.
#[derive(Clone)]
pub struct ContentMetricsService {
    metrics: Arc<dyn MetricStore>,
    views: ViewDeduplicator,
    reconciler: ReconciliationJob,
}

impl ContentMetricsService {
    pub fn new(
        metrics: Arc<dyn MetricStore>,
        views: ViewDeduplicator,
        reconciler: ReconciliationJob,
    ) -> Self {
        Self {
            metrics,
            views,
            reconciler,
        }
    }

    pub async fn initialize_post(&self, content_id: i64) -> DomainResult<()> {
        self.reconciler.initialize(content_id, &POST_METRICS).await
    }

    pub async fn initialize_reply(&self, content_id: i64) -> DomainResult<()> {
        self.reconciler.initialize(content_id, &REPLY_METRICS).await
    }

    /// Counts a view unless the viewer is anonymous or already viewed the
    /// content inside the dedup window. Returns whether it was counted.
    pub async fn record_view(&self, content_id: i64, user_id: Option<i64>) -> DomainResult<bool> {
        let content_id = require_content_id(content_id)?;
        let Some(user_id) = user_id.filter(|id| *id > 0) else {
            tracing::debug!(content_id, "anonymous view not counted");
            return Ok(false);
        };
        if !self.views.should_increment_view(user_id, content_id).await? {
            tracing::debug!(content_id, user_id, "repeat view inside dedup window");
            return Ok(false);
        }
        self.metrics
            .increment(content_id, MetricName::ViewCount, 1)
            .await?;
        Ok(true)
    }

    pub async fn reply_created(&self, parent_id: i64, reply_id: i64) -> DomainResult<i64> {
        let parent_id = require_content_id(parent_id)?;
        self.initialize_reply(reply_id).await?;
        let outcome = self
            .metrics
            .increment(parent_id, MetricName::ReplyCount, 1)
            .await?;
        Ok(outcome.value)
    }

    pub async fn reply_deleted(&self, parent_id: i64) -> DomainResult<i64> {
        let parent_id = require_content_id(parent_id)?;
        let outcome = self
            .metrics
            .increment(parent_id, MetricName::ReplyCount, -1)
            .await?;
        if outcome.clamped {
            tracing::warn!(
                content_id = parent_id,
                metric = MetricName::ReplyCount.as_str(),
                "reply_count floored at zero"
            );
        }
        Ok(outcome.value)
    }

    pub async fn metrics(&self, content_id: i64) -> DomainResult<ContentMetrics> {
        let content_id = require_content_id(content_id)?;
        self.metrics.get_all(content_id).await
    }

    pub async fn batch_metrics(
        &self,
        metric: MetricName,
        content_ids: &[i64],
    ) -> DomainResult<HashMap<i64, i64>> {
        let candidates = normalize_content_ids(content_ids);
        let mut values: HashMap<i64, i64> = content_ids.iter().map(|id| (*id, 0)).collect();
        if candidates.is_empty() {
            return Ok(values);
        }
        values.extend(self.metrics.batch_get(&candidates, metric).await?);
        Ok(values)
    }

    pub async fn top_by_metric(&self, metric: MetricName, limit: usize) -> DomainResult<Vec<i64>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.metrics.top_by_metric(metric, limit).await
    }
}
