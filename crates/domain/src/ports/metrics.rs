use std::collections::HashMap;

use crate::DomainResult;
use crate::metrics::{ContentMetrics, IncrementOutcome, MetricName};
use crate::ports::BoxFuture;

/// Cached per-content counters. Values here may lag the ledger.
pub trait MetricStore: Send + Sync {
    /// Absent records read as zero.
    fn get(&self, content_id: i64, metric: MetricName) -> BoxFuture<'_, DomainResult<i64>>;

    fn get_all(&self, content_id: i64) -> BoxFuture<'_, DomainResult<ContentMetrics>>;

    /// Overwrites the value. Negative values fail with `InvalidState`.
    fn set(&self, content_id: i64, metric: MetricName, value: i64)
    -> BoxFuture<'_, DomainResult<()>>;

    /// Adds `delta`, flooring the result at zero.
    fn increment(
        &self,
        content_id: i64,
        metric: MetricName,
        delta: i64,
    ) -> BoxFuture<'_, DomainResult<IncrementOutcome>>;

    fn batch_get(
        &self,
        content_ids: &[i64],
        metric: MetricName,
    ) -> BoxFuture<'_, DomainResult<HashMap<i64, i64>>>;

    /// Content ids ordered by value descending, ties by id ascending.
    fn top_by_metric(&self, metric: MetricName, limit: usize)
    -> BoxFuture<'_, DomainResult<Vec<i64>>>;

    fn content_ids(&self, metric: MetricName) -> BoxFuture<'_, DomainResult<Vec<i64>>>;
}
