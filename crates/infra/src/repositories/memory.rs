use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use forum_domain::DomainResult;
use forum_domain::content::ContentKind;
use forum_domain::error::DomainError;
use forum_domain::metrics::{
    ContentMetrics, IncrementOutcome, MetricName, ensure_non_negative, rank_by_value,
};
use forum_domain::ports::BoxFuture;
use forum_domain::ports::content::ContentDirectory;
use forum_domain::ports::metrics::MetricStore;
use forum_domain::ports::relations::RelationLedger;
use forum_domain::relations::{Relation, RelationKey, RelationKind, sort_recent_first};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryRelationLedger {
    store: Arc<RwLock<HashMap<RelationKey, Relation>>>,
}

impl InMemoryRelationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn filtered<F>(&self, predicate: F) -> Vec<Relation>
    where
        F: Fn(&Relation) -> bool,
    {
        self.store
            .read()
            .await
            .values()
            .filter(|relation| predicate(relation))
            .cloned()
            .collect()
    }
}

impl RelationLedger for InMemoryRelationLedger {
    fn insert(&self, relation: &Relation) -> BoxFuture<'_, DomainResult<Relation>> {
        let relation = relation.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let mut items = store.write().await;
            let key = relation.key();
            if items.contains_key(&key) {
                return Err(DomainError::Conflict);
            }
            items.insert(key, relation.clone());
            Ok(relation)
        })
    }

    fn delete(&self, key: &RelationKey) -> BoxFuture<'_, DomainResult<bool>> {
        let key = *key;
        let store = self.store.clone();
        Box::pin(async move { Ok(store.write().await.remove(&key).is_some()) })
    }

    fn exists(&self, key: &RelationKey) -> BoxFuture<'_, DomainResult<bool>> {
        let key = *key;
        let store = self.store.clone();
        Box::pin(async move { Ok(store.read().await.contains_key(&key)) })
    }

    fn count_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<i64>> {
        Box::pin(async move {
            let count = self
                .filtered(|item| item.content_id == content_id && item.kind == kind)
                .await
                .len();
            Ok(count as i64)
        })
    }

    fn user_ids_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        Box::pin(async move {
            let mut user_ids: Vec<i64> = self
                .filtered(|item| item.content_id == content_id && item.kind == kind)
                .await
                .into_iter()
                .map(|item| item.user_id)
                .collect();
            user_ids.sort_unstable();
            Ok(user_ids)
        })
    }

    fn content_ids_by_user(
        &self,
        user_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        Box::pin(async move {
            let mut content_ids: Vec<i64> = self
                .filtered(|item| item.user_id == user_id && item.kind == kind)
                .await
                .into_iter()
                .map(|item| item.content_id)
                .collect();
            content_ids.sort_unstable();
            Ok(content_ids)
        })
    }

    fn related_subset(
        &self,
        user_id: i64,
        content_ids: &[i64],
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        let candidates: HashSet<i64> = content_ids.iter().copied().collect();
        Box::pin(async move {
            let mut related: Vec<i64> = self
                .filtered(|item| {
                    item.user_id == user_id
                        && item.kind == kind
                        && candidates.contains(&item.content_id)
                })
                .await
                .into_iter()
                .map(|item| item.content_id)
                .collect();
            related.sort_unstable();
            Ok(related)
        })
    }

    fn recent_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<Relation>>> {
        Box::pin(async move {
            let mut relations = self
                .filtered(|item| item.content_id == content_id && item.kind == kind)
                .await;
            sort_recent_first(&mut relations);
            relations.truncate(limit);
            Ok(relations)
        })
    }

    fn recent_by_user(
        &self,
        user_id: i64,
        kind: RelationKind,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<Relation>>> {
        Box::pin(async move {
            let mut relations = self
                .filtered(|item| item.user_id == user_id && item.kind == kind)
                .await;
            sort_recent_first(&mut relations);
            relations.truncate(limit);
            Ok(relations)
        })
    }

    fn delete_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<u64>> {
        let store = self.store.clone();
        Box::pin(async move {
            let mut items = store.write().await;
            let before = items.len();
            items.retain(|key, _| !(key.content_id == content_id && key.kind == kind));
            Ok((before - items.len()) as u64)
        })
    }

    fn delete_by_user(&self, user_id: i64, kind: RelationKind) -> BoxFuture<'_, DomainResult<u64>> {
        let store = self.store.clone();
        Box::pin(async move {
            let mut items = store.write().await;
            let before = items.len();
            items.retain(|key, _| !(key.user_id == user_id && key.kind == kind));
            Ok((before - items.len()) as u64)
        })
    }
}

#[derive(Default)]
pub struct InMemoryMetricStore {
    store: Arc<RwLock<HashMap<(i64, MetricName), i64>>>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricStore for InMemoryMetricStore {
    fn get(&self, content_id: i64, metric: MetricName) -> BoxFuture<'_, DomainResult<i64>> {
        let store = self.store.clone();
        Box::pin(async move {
            Ok(store
                .read()
                .await
                .get(&(content_id, metric))
                .copied()
                .unwrap_or(0))
        })
    }

    fn get_all(&self, content_id: i64) -> BoxFuture<'_, DomainResult<ContentMetrics>> {
        let store = self.store.clone();
        Box::pin(async move {
            let items = store.read().await;
            Ok(MetricName::ALL
                .into_iter()
                .fold(ContentMetrics::empty(content_id), |metrics, metric| {
                    let value = items.get(&(content_id, metric)).copied().unwrap_or(0);
                    metrics.with_value(metric, value)
                }))
        })
    }

    fn set(
        &self,
        content_id: i64,
        metric: MetricName,
        value: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let store = self.store.clone();
        Box::pin(async move {
            ensure_non_negative(metric, value)?;
            store.write().await.insert((content_id, metric), value);
            Ok(())
        })
    }

    fn increment(
        &self,
        content_id: i64,
        metric: MetricName,
        delta: i64,
    ) -> BoxFuture<'_, DomainResult<IncrementOutcome>> {
        let store = self.store.clone();
        Box::pin(async move {
            let mut items = store.write().await;
            let slot = items.entry((content_id, metric)).or_insert(0);
            let outcome = IncrementOutcome::apply(*slot, delta);
            *slot = outcome.value;
            Ok(outcome)
        })
    }

    fn batch_get(
        &self,
        content_ids: &[i64],
        metric: MetricName,
    ) -> BoxFuture<'_, DomainResult<HashMap<i64, i64>>> {
        let content_ids = content_ids.to_vec();
        let store = self.store.clone();
        Box::pin(async move {
            let items = store.read().await;
            Ok(content_ids
                .into_iter()
                .map(|content_id| {
                    let value = items.get(&(content_id, metric)).copied().unwrap_or(0);
                    (content_id, value)
                })
                .collect())
        })
    }

    fn top_by_metric(
        &self,
        metric: MetricName,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        let store = self.store.clone();
        Box::pin(async move {
            let mut entries: Vec<(i64, i64)> = store
                .read()
                .await
                .iter()
                .filter(|((_, name), _)| *name == metric)
                .map(|((content_id, _), value)| (*content_id, *value))
                .collect();
            rank_by_value(&mut entries);
            Ok(entries
                .into_iter()
                .take(limit)
                .map(|(content_id, _)| content_id)
                .collect())
        })
    }

    fn content_ids(&self, metric: MetricName) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        let store = self.store.clone();
        Box::pin(async move {
            let mut content_ids: Vec<i64> = store
                .read()
                .await
                .keys()
                .filter(|(_, name)| *name == metric)
                .map(|(content_id, _)| *content_id)
                .collect();
            content_ids.sort_unstable();
            Ok(content_ids)
        })
    }
}

#[derive(Clone, Debug)]
struct DirectoryEntry {
    kind: ContentKind,
    parent_id: Option<i64>,
    deleted: bool,
}

/// Stand-in for the content storage collaborator.
#[derive(Default)]
pub struct InMemoryContentDirectory {
    store: Arc<RwLock<HashMap<i64, DirectoryEntry>>>,
}

impl InMemoryContentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_post(&self, post_id: i64) {
        self.store.write().await.insert(
            post_id,
            DirectoryEntry {
                kind: ContentKind::Post,
                parent_id: None,
                deleted: false,
            },
        );
    }

    pub async fn add_reply(&self, reply_id: i64, parent_id: i64) {
        self.store.write().await.insert(
            reply_id,
            DirectoryEntry {
                kind: ContentKind::Reply,
                parent_id: Some(parent_id),
                deleted: false,
            },
        );
    }

    /// Soft delete; the entry stays resolvable but no longer counts.
    pub async fn mark_deleted(&self, content_id: i64) -> DomainResult<()> {
        let mut items = self.store.write().await;
        let entry = items.get_mut(&content_id).ok_or(DomainError::NotFound)?;
        entry.deleted = true;
        Ok(())
    }
}

impl ContentDirectory for InMemoryContentDirectory {
    fn kind_of(&self, content_id: i64) -> BoxFuture<'_, DomainResult<Option<ContentKind>>> {
        let store = self.store.clone();
        Box::pin(async move {
            Ok(store
                .read()
                .await
                .get(&content_id)
                .filter(|entry| !entry.deleted)
                .map(|entry| entry.kind))
        })
    }

    fn count_replies(&self, post_id: i64) -> BoxFuture<'_, DomainResult<i64>> {
        let store = self.store.clone();
        Box::pin(async move {
            let count = store
                .read()
                .await
                .values()
                .filter(|entry| {
                    entry.kind == ContentKind::Reply
                        && entry.parent_id == Some(post_id)
                        && !entry.deleted
                })
                .count();
            Ok(count as i64)
        })
    }
}
