use std::sync::Arc;

use forum_domain::DomainResult;
use forum_domain::error::DomainError;
use forum_domain::likes::LikeCoordinator;
use forum_domain::metrics::MetricName;
use forum_domain::ports::BoxFuture;
use forum_domain::ports::metrics::MetricStore;
use forum_domain::ports::relations::RelationLedger;
use forum_domain::relations::{Relation, RelationKey, RelationKind};
use forum_infra::repositories::{InMemoryMetricStore, InMemoryRelationLedger};

struct Harness {
    ledger: Arc<InMemoryRelationLedger>,
    metrics: Arc<InMemoryMetricStore>,
    likes: LikeCoordinator,
}

fn harness() -> Harness {
    let ledger = Arc::new(InMemoryRelationLedger::new());
    let metrics = Arc::new(InMemoryMetricStore::new());
    let likes = LikeCoordinator::new(ledger.clone(), metrics.clone());
    Harness {
        ledger,
        metrics,
        likes,
    }
}

#[tokio::test]
async fn like_is_idempotent_and_counted_from_the_ledger() {
    let h = harness();

    assert!(h.likes.like(42, Some(7)).await.unwrap());
    assert_eq!(h.likes.like_count(42).await.unwrap(), 1);
    assert!(!h.likes.like(42, Some(7)).await.unwrap());
    assert_eq!(h.likes.like_count(42).await.unwrap(), 1);
    assert_eq!(h.ledger.len().await, 1);

    assert!(h.likes.unlike(42, Some(7)).await.unwrap());
    assert_eq!(h.likes.like_count(42).await.unwrap(), 0);
    assert!(!h.likes.unlike(42, Some(7)).await.unwrap());
}

#[tokio::test]
async fn like_then_unlike_restores_prior_state() {
    let h = harness();
    h.likes.like(3, Some(1)).await.unwrap();
    h.likes.like(3, Some(2)).await.unwrap();
    let before = h.likes.like_count(3).await.unwrap();

    h.likes.like(3, Some(9)).await.unwrap();
    h.likes.unlike(3, Some(9)).await.unwrap();

    assert!(!h.likes.is_liked(3, Some(9)).await.unwrap());
    assert_eq!(h.likes.like_count(3).await.unwrap(), before);
}

#[tokio::test]
async fn toggle_flips_and_reports_new_state() {
    let h = harness();

    assert!(h.likes.toggle(5, Some(9)).await.unwrap());
    assert!(h.likes.is_liked(5, Some(9)).await.unwrap());
    assert!(!h.likes.toggle(5, Some(9)).await.unwrap());
    assert!(!h.likes.is_liked(5, Some(9)).await.unwrap());
    assert!(h.ledger.is_empty().await);
}

#[tokio::test]
async fn mutations_reject_missing_ids() {
    let h = harness();

    let err = h.likes.like(42, None).await.expect_err("missing user");
    assert!(matches!(err, DomainError::InvalidArgument(_)));
    let err = h.likes.unlike(0, Some(7)).await.expect_err("missing content");
    assert!(matches!(err, DomainError::InvalidArgument(_)));
    let err = h.likes.toggle(-1, Some(7)).await.expect_err("bad content");
    assert!(matches!(err, DomainError::InvalidArgument(_)));
    let err = h
        .likes
        .get_user_recent_likes(None, 5)
        .await
        .expect_err("missing user");
    assert!(matches!(err, DomainError::InvalidArgument(_)));
}

#[tokio::test]
async fn anonymous_viewers_have_liked_nothing() {
    let h = harness();
    h.likes.like(1, Some(7)).await.unwrap();

    assert!(!h.likes.is_liked(1, None).await.unwrap());
    let status = h.likes.batch_check_like_status(None, &[1, 2]).await.unwrap();
    assert_eq!(status.get(&1), Some(&false));
    assert_eq!(status.get(&2), Some(&false));
}

#[tokio::test]
async fn batch_status_covers_every_requested_id() {
    let h = harness();
    h.likes.like(1, Some(7)).await.unwrap();
    h.likes.like(3, Some(7)).await.unwrap();
    h.likes.like(2, Some(8)).await.unwrap();

    let status = h
        .likes
        .batch_check_like_status(Some(7), &[1, 2, 3, 4])
        .await
        .unwrap();
    assert_eq!(status.len(), 4);
    assert!(status[&1]);
    assert!(!status[&2]);
    assert!(status[&3]);
    assert!(!status[&4]);

    let empty = h.likes.batch_check_like_status(Some(7), &[]).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn batch_counts_read_the_cache_and_default_to_zero() {
    let h = harness();
    h.likes.like(10, Some(1)).await.unwrap();
    h.likes.like(10, Some(2)).await.unwrap();

    let counts = h.likes.batch_get_like_counts(&[10, 999]).await.unwrap();
    assert_eq!(counts[&10], 2);
    assert_eq!(counts[&999], 0);

    h.metrics.set(10, MetricName::LikeCount, 50).await.unwrap();
    let counts = h.likes.batch_get_like_counts(&[10]).await.unwrap();
    assert_eq!(counts[&10], 50);
    assert_eq!(h.likes.like_count(10).await.unwrap(), 2);

    assert!(h.likes.batch_get_like_counts(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn sync_repairs_a_corrupted_counter() {
    let h = harness();
    for user_id in [1, 2, 3] {
        h.likes.like(8, Some(user_id)).await.unwrap();
    }
    h.metrics.set(8, MetricName::LikeCount, 99).await.unwrap();

    let outcome = h.likes.sync_like_count(8).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.previous, 99);
    assert_eq!(outcome.value, 3);

    let counts = h.likes.batch_get_like_counts(&[8]).await.unwrap();
    assert_eq!(counts[&8], 3);

    let again = h.likes.sync_like_count(8).await.unwrap();
    assert!(!again.changed);
}

#[tokio::test]
async fn batch_sync_reconciles_each_distinct_id() {
    let h = harness();
    h.likes.like(1, Some(1)).await.unwrap();
    h.metrics.set(1, MetricName::LikeCount, 7).await.unwrap();
    h.metrics.set(2, MetricName::LikeCount, 4).await.unwrap();

    let outcomes = h.likes.batch_sync_like_counts(&[1, 2, 1]).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(h.metrics.get(1, MetricName::LikeCount).await.unwrap(), 1);
    assert_eq!(h.metrics.get(2, MetricName::LikeCount).await.unwrap(), 0);
}

#[tokio::test]
async fn liked_users_recent_likes_and_top_contents() {
    let h = harness();
    h.likes.like(20, Some(3)).await.unwrap();
    h.likes.like(20, Some(1)).await.unwrap();
    h.likes.like(21, Some(1)).await.unwrap();

    let users: Vec<i64> = h.likes.get_liked_user_ids(20).await.unwrap().into_iter().collect();
    assert_eq!(users, vec![1, 3]);

    let contents: Vec<i64> = h
        .likes
        .get_user_liked_content_ids(Some(1))
        .await
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(contents, vec![20, 21]);

    let recent = h.likes.get_recent_likes(20, 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].created_at_ms >= recent[1].created_at_ms);
    assert!(h.likes.get_recent_likes(20, 0).await.unwrap().is_empty());

    let user_recent = h.likes.get_user_recent_likes(Some(1), 1).await.unwrap();
    assert_eq!(user_recent.len(), 1);

    assert_eq!(h.likes.get_top_liked_contents(5).await.unwrap(), vec![20, 21]);
}

#[tokio::test]
async fn purging_content_clears_relations_and_counter() {
    let h = harness();
    h.likes.like(30, Some(1)).await.unwrap();
    h.likes.like(30, Some(2)).await.unwrap();

    assert_eq!(h.likes.purge_content_likes(30).await.unwrap(), 2);
    assert_eq!(h.likes.like_count(30).await.unwrap(), 0);
    assert_eq!(h.metrics.get(30, MetricName::LikeCount).await.unwrap(), 0);
}

#[tokio::test]
async fn purging_a_user_repairs_every_touched_counter() {
    let h = harness();
    h.likes.like(40, Some(5)).await.unwrap();
    h.likes.like(41, Some(5)).await.unwrap();
    h.likes.like(41, Some(6)).await.unwrap();

    assert_eq!(h.likes.purge_user_likes(Some(5)).await.unwrap(), 2);
    assert_eq!(h.metrics.get(40, MetricName::LikeCount).await.unwrap(), 0);
    assert_eq!(h.metrics.get(41, MetricName::LikeCount).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_likes_create_a_single_relation() {
    let h = harness();
    let likes = Arc::new(h.likes.clone());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let likes = likes.clone();
        handles.push(tokio::spawn(
            async move { likes.like(77, Some(4)).await.unwrap() },
        ));
    }
    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(h.ledger.len().await, 1);
    assert_eq!(h.likes.like_count(77).await.unwrap(), 1);
    assert_eq!(h.metrics.get(77, MetricName::LikeCount).await.unwrap(), 1);
}

/// Ledger whose existence check always misses, so every caller reaches
/// `insert` the way racing requests do between check and write.
struct StaleReadLedger {
    inner: Arc<InMemoryRelationLedger>,
}

impl RelationLedger for StaleReadLedger {
    fn insert(&self, relation: &Relation) -> BoxFuture<'_, DomainResult<Relation>> {
        self.inner.insert(relation)
    }

    fn delete(&self, key: &RelationKey) -> BoxFuture<'_, DomainResult<bool>> {
        self.inner.delete(key)
    }

    fn exists(&self, _key: &RelationKey) -> BoxFuture<'_, DomainResult<bool>> {
        Box::pin(async { Ok(false) })
    }

    fn count_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<i64>> {
        self.inner.count_by_content(content_id, kind)
    }

    fn user_ids_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        self.inner.user_ids_by_content(content_id, kind)
    }

    fn content_ids_by_user(
        &self,
        user_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        self.inner.content_ids_by_user(user_id, kind)
    }

    fn related_subset(
        &self,
        user_id: i64,
        content_ids: &[i64],
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        self.inner.related_subset(user_id, content_ids, kind)
    }

    fn recent_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<Relation>>> {
        self.inner.recent_by_content(content_id, kind, limit)
    }

    fn recent_by_user(
        &self,
        user_id: i64,
        kind: RelationKind,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<Relation>>> {
        self.inner.recent_by_user(user_id, kind, limit)
    }

    fn delete_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<u64>> {
        self.inner.delete_by_content(content_id, kind)
    }

    fn delete_by_user(&self, user_id: i64, kind: RelationKind) -> BoxFuture<'_, DomainResult<u64>> {
        self.inner.delete_by_user(user_id, kind)
    }
}

#[tokio::test]
async fn insert_conflict_after_a_stale_check_reads_as_already_liked() {
    let ledger = Arc::new(InMemoryRelationLedger::new());
    let metrics = Arc::new(InMemoryMetricStore::new());
    let likes = LikeCoordinator::new(
        Arc::new(StaleReadLedger {
            inner: ledger.clone(),
        }),
        metrics.clone(),
    );

    assert!(likes.like(77, Some(4)).await.unwrap());
    assert!(!likes.like(77, Some(4)).await.unwrap());
    assert!(!likes.like(77, Some(4)).await.unwrap());

    assert_eq!(ledger.len().await, 1);
    assert_eq!(likes.like_count(77).await.unwrap(), 1);
    assert_eq!(metrics.get(77, MetricName::LikeCount).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_likes_past_the_check_create_a_single_relation() {
    let ledger = Arc::new(InMemoryRelationLedger::new());
    let metrics = Arc::new(InMemoryMetricStore::new());
    let likes = LikeCoordinator::new(
        Arc::new(StaleReadLedger {
            inner: ledger.clone(),
        }),
        metrics.clone(),
    );

    let mut handles = Vec::new();
    for _ in 0..16 {
        let likes = likes.clone();
        handles.push(tokio::spawn(
            async move { likes.like(78, Some(4)).await.unwrap() },
        ));
    }
    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(ledger.len().await, 1);
    assert_eq!(metrics.get(78, MetricName::LikeCount).await.unwrap(), 1);
}

#[tokio::test]
async fn other_relation_kinds_reuse_the_ledger_without_a_counter() {
    let h = harness();
    let bookmarks = LikeCoordinator::new(h.ledger.clone(), h.metrics.clone())
        .with_kind(RelationKind::Bookmark);

    assert!(bookmarks.like(50, Some(1)).await.unwrap());
    assert!(!h.likes.is_liked(50, Some(1)).await.unwrap());
    assert_eq!(h.metrics.get(50, MetricName::LikeCount).await.unwrap(), 0);

    let counts = bookmarks.batch_get_like_counts(&[50]).await.unwrap();
    assert_eq!(counts[&50], 1);

    let err = bookmarks.sync_like_count(50).await.expect_err("no counter");
    assert!(matches!(err, DomainError::InvalidArgument(_)));
}
