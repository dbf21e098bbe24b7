//! Like/unlike orchestration over the relation ledger.
//!
//! The ledger is the source of truth. `like_count` in the metric store is
//! nudged after each successful ledger write, but that second write is not
//! atomic with the first; [`ReconciliationJob`] repairs any drift.
//!
//! `toggle` reads then acts. Two concurrent toggles on the same pair may both
//! observe the same state; the uniqueness constraint still prevents duplicate
//! relations, but the returned state can be stale for one of the callers.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::DomainResult;
use crate::clock::{Clock, SystemClock};
use crate::error::DomainError;
use crate::metrics::MetricName;
use crate::ports::metrics::MetricStore;
use crate::ports::relations::RelationLedger;
use crate::reconciliation::{ReconcileOutcome, ReconciliationJob};
use crate::relations::{Relation, RelationKey, RelationKind};
use crate::util::{normalize_content_ids, require_content_id, require_user_id};

#[derive(Clone)]
pub struct LikeCoordinator {
    ledger: Arc<dyn RelationLedger>,
    metrics: Arc<dyn MetricStore>,
    reconciler: ReconciliationJob,
    clock: Arc<dyn Clock>,
    kind: RelationKind,
}

impl LikeCoordinator {
    pub fn new(ledger: Arc<dyn RelationLedger>, metrics: Arc<dyn MetricStore>) -> Self {
        let reconciler = ReconciliationJob::new(ledger.clone(), metrics.clone());
        Self {
            ledger,
            metrics,
            reconciler,
            clock: Arc::new(SystemClock),
            kind: RelationKind::Like,
        }
    }

    pub fn with_kind(mut self, kind: RelationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_reconciler(mut self, reconciler: ReconciliationJob) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Returns `false` when the relation already existed.
    pub async fn like(&self, content_id: i64, user_id: Option<i64>) -> DomainResult<bool> {
        let key = self.key(content_id, user_id)?;
        if self.ledger.exists(&key).await? {
            return Ok(false);
        }

        let relation = Relation::new(key, self.clock.now_ms());
        match self.ledger.insert(&relation).await {
            Ok(_) => {
                self.adjust_counter(key.content_id, 1).await;
                tracing::debug!(
                    content_id = key.content_id,
                    user_id = key.user_id,
                    kind = key.kind.as_str(),
                    "relation recorded"
                );
                Ok(true)
            }
            Err(DomainError::Conflict) => {
                tracing::debug!(
                    content_id = key.content_id,
                    user_id = key.user_id,
                    kind = key.kind.as_str(),
                    "concurrent insert lost the uniqueness race"
                );
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Returns `false` when there was nothing to remove.
    pub async fn unlike(&self, content_id: i64, user_id: Option<i64>) -> DomainResult<bool> {
        let key = self.key(content_id, user_id)?;
        if !self.ledger.exists(&key).await? {
            return Ok(false);
        }

        let removed = self.ledger.delete(&key).await?;
        if removed {
            self.adjust_counter(key.content_id, -1).await;
            tracing::debug!(
                content_id = key.content_id,
                user_id = key.user_id,
                kind = key.kind.as_str(),
                "relation removed"
            );
        }
        Ok(removed)
    }

    /// Flips the relation and returns the new state.
    pub async fn toggle(&self, content_id: i64, user_id: Option<i64>) -> DomainResult<bool> {
        let key = self.key(content_id, user_id)?;
        if self.ledger.exists(&key).await? {
            self.unlike(key.content_id, Some(key.user_id)).await?;
            Ok(false)
        } else {
            self.like(key.content_id, Some(key.user_id)).await?;
            Ok(true)
        }
    }

    /// Anonymous viewers have liked nothing.
    pub async fn is_liked(&self, content_id: i64, user_id: Option<i64>) -> DomainResult<bool> {
        let content_id = require_content_id(content_id)?;
        let Some(user_id) = user_id.filter(|id| *id > 0) else {
            return Ok(false);
        };
        self.ledger
            .exists(&RelationKey::new(user_id, content_id, self.kind))
            .await
    }

    /// Counted from the ledger, never from the cache.
    pub async fn like_count(&self, content_id: i64) -> DomainResult<i64> {
        let content_id = require_content_id(content_id)?;
        self.ledger.count_by_content(content_id, self.kind).await
    }

    /// One bulk ledger lookup. Every requested id appears in the result.
    pub async fn batch_check_like_status(
        &self,
        user_id: Option<i64>,
        content_ids: &[i64],
    ) -> DomainResult<HashMap<i64, bool>> {
        let mut status: HashMap<i64, bool> = content_ids.iter().map(|id| (*id, false)).collect();
        let Some(user_id) = user_id.filter(|id| *id > 0) else {
            return Ok(status);
        };
        let candidates = normalize_content_ids(content_ids);
        if candidates.is_empty() {
            return Ok(status);
        }

        let liked: HashSet<i64> = self
            .ledger
            .related_subset(user_id, &candidates, self.kind)
            .await?
            .into_iter()
            .collect();
        for (content_id, flag) in status.iter_mut() {
            *flag = liked.contains(content_id);
        }
        Ok(status)
    }

    /// Reads the cached counter; list views accept lag here.
    pub async fn batch_get_like_counts(
        &self,
        content_ids: &[i64],
    ) -> DomainResult<HashMap<i64, i64>> {
        let candidates = normalize_content_ids(content_ids);
        let mut counts: HashMap<i64, i64> = content_ids.iter().map(|id| (*id, 0)).collect();
        if candidates.is_empty() {
            return Ok(counts);
        }

        match self.kind.counter_metric() {
            Some(metric) => {
                let cached = self.metrics.batch_get(&candidates, metric).await?;
                for (content_id, value) in cached {
                    if let Some(slot) = counts.get_mut(&content_id) {
                        *slot = value;
                    }
                }
            }
            None => {
                for content_id in candidates {
                    let value = self.ledger.count_by_content(content_id, self.kind).await?;
                    counts.insert(content_id, value);
                }
            }
        }
        Ok(counts)
    }

    pub async fn get_liked_user_ids(&self, content_id: i64) -> DomainResult<BTreeSet<i64>> {
        let content_id = require_content_id(content_id)?;
        let user_ids = self
            .ledger
            .user_ids_by_content(content_id, self.kind)
            .await?;
        Ok(user_ids.into_iter().collect())
    }

    pub async fn get_user_liked_content_ids(
        &self,
        user_id: Option<i64>,
    ) -> DomainResult<BTreeSet<i64>> {
        let user_id = require_user_id(user_id)?;
        let content_ids = self.ledger.content_ids_by_user(user_id, self.kind).await?;
        Ok(content_ids.into_iter().collect())
    }

    pub async fn get_recent_likes(
        &self,
        content_id: i64,
        limit: usize,
    ) -> DomainResult<Vec<Relation>> {
        let content_id = require_content_id(content_id)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.ledger
            .recent_by_content(content_id, self.kind, limit)
            .await
    }

    pub async fn get_user_recent_likes(
        &self,
        user_id: Option<i64>,
        limit: usize,
    ) -> DomainResult<Vec<Relation>> {
        let user_id = require_user_id(user_id)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.ledger.recent_by_user(user_id, self.kind, limit).await
    }

    pub async fn get_top_liked_contents(&self, limit: usize) -> DomainResult<Vec<i64>> {
        let metric = self.counter_metric()?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.metrics.top_by_metric(metric, limit).await
    }

    pub async fn sync_like_count(&self, content_id: i64) -> DomainResult<ReconcileOutcome> {
        let metric = self.counter_metric()?;
        self.reconciler.reconcile(content_id, metric).await
    }

    pub async fn batch_sync_like_counts(
        &self,
        content_ids: &[i64],
    ) -> DomainResult<Vec<ReconcileOutcome>> {
        let metric = self.counter_metric()?;
        self.reconciler.reconcile_many(content_ids, metric).await
    }

    /// Removes every relation on a content item and resets its counter.
    pub async fn purge_content_likes(&self, content_id: i64) -> DomainResult<u64> {
        let content_id = require_content_id(content_id)?;
        let removed = self.ledger.delete_by_content(content_id, self.kind).await?;
        if let Some(metric) = self.kind.counter_metric() {
            self.reconciler.reconcile(content_id, metric).await?;
        }
        Ok(removed)
    }

    /// Removes every relation a user holds and repairs the affected counters.
    pub async fn purge_user_likes(&self, user_id: Option<i64>) -> DomainResult<u64> {
        let user_id = require_user_id(user_id)?;
        let affected = self.ledger.content_ids_by_user(user_id, self.kind).await?;
        let removed = self.ledger.delete_by_user(user_id, self.kind).await?;
        if let Some(metric) = self.kind.counter_metric() {
            self.reconciler.reconcile_many(&affected, metric).await?;
        }
        Ok(removed)
    }

    fn key(&self, content_id: i64, user_id: Option<i64>) -> DomainResult<RelationKey> {
        let content_id = require_content_id(content_id)?;
        let user_id = require_user_id(user_id)?;
        Ok(RelationKey::new(user_id, content_id, self.kind))
    }

    fn counter_metric(&self) -> DomainResult<MetricName> {
        self.kind.counter_metric().ok_or_else(|| {
            DomainError::InvalidArgument(format!(
                "relation kind '{}' has no cached counter",
                self.kind
            ))
        })
    }

    async fn adjust_counter(&self, content_id: i64, delta: i64) {
        let Some(metric) = self.kind.counter_metric() else {
            return;
        };
        match self.metrics.increment(content_id, metric, delta).await {
            Ok(outcome) if outcome.clamped => {
                tracing::warn!(
                    content_id,
                    metric = metric.as_str(),
                    delta,
                    "cached counter floored at zero"
                );
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(
                    content_id,
                    metric = metric.as_str(),
                    delta,
                    error = %err,
                    "cached counter update failed; left for reconciliation"
                );
            }
        }
    }
}
