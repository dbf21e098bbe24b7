use crate::DomainResult;
use crate::ports::BoxFuture;
use crate::relations::{Relation, RelationKey, RelationKind};

/// Authoritative store of user/content relations.
///
/// `insert` must enforce uniqueness of [`RelationKey`] and fail with
/// [`crate::error::DomainError::Conflict`] when the key is already present.
pub trait RelationLedger: Send + Sync {
    fn insert(&self, relation: &Relation) -> BoxFuture<'_, DomainResult<Relation>>;

    /// Returns `true` when a relation was removed.
    fn delete(&self, key: &RelationKey) -> BoxFuture<'_, DomainResult<bool>>;

    fn exists(&self, key: &RelationKey) -> BoxFuture<'_, DomainResult<bool>>;

    fn count_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<i64>>;

    fn user_ids_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>>;

    fn content_ids_by_user(
        &self,
        user_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>>;

    /// Subset of `content_ids` the user holds a relation of `kind` to.
    fn related_subset(
        &self,
        user_id: i64,
        content_ids: &[i64],
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>>;

    fn recent_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<Relation>>>;

    fn recent_by_user(
        &self,
        user_id: i64,
        kind: RelationKind,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<Relation>>>;

    fn delete_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<u64>>;

    fn delete_by_user(&self, user_id: i64, kind: RelationKind) -> BoxFuture<'_, DomainResult<u64>>;
}
