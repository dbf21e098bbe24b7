use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::metrics::MetricName;

/// Kind of relation a user holds to a content item.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RelationKind {
    Like,
    Bookmark,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Like => "like",
            RelationKind::Bookmark => "bookmark",
        }
    }

    /// Cached aggregate that mirrors the number of relations of this kind.
    pub fn counter_metric(&self) -> Option<MetricName> {
        match self {
            RelationKind::Like => Some(MetricName::LikeCount),
            RelationKind::Bookmark => None,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "like" => Ok(RelationKind::Like),
            "bookmark" => Ok(RelationKind::Bookmark),
            _ => Err(DomainError::InvalidArgument(format!(
                "unknown relation kind '{value}'"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RelationKey {
    pub user_id: i64,
    pub content_id: i64,
    pub kind: RelationKind,
}

impl RelationKey {
    pub fn new(user_id: i64, content_id: i64, kind: RelationKind) -> Self {
        Self {
            user_id,
            content_id,
            kind,
        }
    }

    /// Stable textual form, usable as a storage record id.
    pub fn storage_key(&self) -> String {
        format!("{}_{}_{}", self.kind.as_str(), self.user_id, self.content_id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relation {
    pub user_id: i64,
    pub content_id: i64,
    pub kind: RelationKind,
    pub created_at_ms: i64,
}

impl Relation {
    pub fn new(key: RelationKey, created_at_ms: i64) -> Self {
        Self {
            user_id: key.user_id,
            content_id: key.content_id,
            kind: key.kind,
            created_at_ms,
        }
    }

    pub fn key(&self) -> RelationKey {
        RelationKey::new(self.user_id, self.content_id, self.kind)
    }
}

/// Most recent first; equal timestamps fall back to the key so the order is
/// total.
pub fn sort_recent_first(relations: &mut [Relation]) {
    relations.sort_by(|left, right| {
        right
            .created_at_ms
            .cmp(&left.created_at_ms)
            .then_with(|| right.user_id.cmp(&left.user_id))
            .then_with(|| right.content_id.cmp(&left.content_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_its_own_storage_code() {
        for kind in [RelationKind::Like, RelationKind::Bookmark] {
            assert_eq!(kind.as_str().parse::<RelationKind>().unwrap(), kind);
        }
        assert!("dislike".parse::<RelationKind>().is_err());
    }

    #[test]
    fn only_likes_feed_a_counter() {
        assert_eq!(
            RelationKind::Like.counter_metric(),
            Some(MetricName::LikeCount)
        );
        assert_eq!(RelationKind::Bookmark.counter_metric(), None);
    }

    #[test]
    fn storage_key_separates_kinds() {
        let like = RelationKey::new(7, 42, RelationKind::Like);
        let bookmark = RelationKey::new(7, 42, RelationKind::Bookmark);
        assert_eq!(like.storage_key(), "like_7_42");
        assert_ne!(like.storage_key(), bookmark.storage_key());
    }

    #[test]
    fn recent_first_orders_by_timestamp_descending() {
        let mut relations = vec![
            Relation::new(RelationKey::new(1, 5, RelationKind::Like), 100),
            Relation::new(RelationKey::new(2, 5, RelationKind::Like), 300),
            Relation::new(RelationKey::new(3, 5, RelationKind::Like), 200),
        ];
        sort_recent_first(&mut relations);
        let users: Vec<i64> = relations.iter().map(|relation| relation.user_id).collect();
        assert_eq!(users, vec![2, 3, 1]);
    }
}
