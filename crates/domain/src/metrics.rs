use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    ViewCount,
    LikeCount,
    ReplyCount,
}

impl MetricName {
    pub const ALL: [MetricName; 3] = [
        MetricName::ViewCount,
        MetricName::LikeCount,
        MetricName::ReplyCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ViewCount => "view_count",
            MetricName::LikeCount => "like_count",
            MetricName::ReplyCount => "reply_count",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricName {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .into_iter()
            .find(|metric| metric.as_str() == value)
            .ok_or_else(|| DomainError::InvalidArgument(format!("unknown metric '{value}'")))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricRecord {
    pub content_id: i64,
    pub metric: MetricName,
    pub value: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentMetrics {
    pub content_id: i64,
    pub view_count: i64,
    pub like_count: i64,
    pub reply_count: i64,
}

impl ContentMetrics {
    pub fn empty(content_id: i64) -> Self {
        Self {
            content_id,
            ..Self::default()
        }
    }

    pub fn value(&self, metric: MetricName) -> i64 {
        match metric {
            MetricName::ViewCount => self.view_count,
            MetricName::LikeCount => self.like_count,
            MetricName::ReplyCount => self.reply_count,
        }
    }

    pub fn with_value(mut self, metric: MetricName, value: i64) -> Self {
        match metric {
            MetricName::ViewCount => self.view_count = value,
            MetricName::LikeCount => self.like_count = value,
            MetricName::ReplyCount => self.reply_count = value,
        }
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IncrementOutcome {
    pub value: i64,
    /// The raw sum went below zero and was floored.
    pub clamped: bool,
}

impl IncrementOutcome {
    pub fn apply(current: i64, delta: i64) -> Self {
        let raw = current.saturating_add(delta);
        if raw < 0 {
            Self {
                value: 0,
                clamped: true,
            }
        } else {
            Self {
                value: raw,
                clamped: false,
            }
        }
    }
}

pub fn ensure_non_negative(metric: MetricName, value: i64) -> Result<(), DomainError> {
    if value < 0 {
        return Err(DomainError::InvalidState(format!(
            "{metric} cannot be set to negative value {value}"
        )));
    }
    Ok(())
}

/// Ordering used by `top_by_metric`: value descending, then id ascending.
pub fn rank_by_value(entries: &mut [(i64, i64)]) {
    entries.sort_by(|(left_id, left_value), (right_id, right_value)| {
        right_value
            .cmp(left_value)
            .then_with(|| left_id.cmp(right_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_round_trip_through_storage_names() {
        assert_eq!("like_count".parse::<MetricName>().unwrap(), MetricName::LikeCount);
        assert!("share_count".parse::<MetricName>().is_err());
    }

    #[test]
    fn increment_floors_at_zero() {
        assert_eq!(
            IncrementOutcome::apply(1, -3),
            IncrementOutcome {
                value: 0,
                clamped: true
            }
        );
        assert_eq!(
            IncrementOutcome::apply(2, -2),
            IncrementOutcome {
                value: 0,
                clamped: false
            }
        );
    }

    #[test]
    fn negative_set_is_invalid_state() {
        let err = ensure_non_negative(MetricName::ReplyCount, -1).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert!(ensure_non_negative(MetricName::ReplyCount, 0).is_ok());
    }

    #[test]
    fn ranking_breaks_ties_by_ascending_id() {
        let mut entries = vec![(9, 5), (3, 5), (4, 10), (1, 0)];
        rank_by_value(&mut entries);
        let ids: Vec<i64> = entries.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![4, 3, 9, 1]);
    }

    #[test]
    fn content_metrics_reads_back_written_values() {
        let metrics = ContentMetrics::empty(8).with_value(MetricName::LikeCount, 3);
        assert_eq!(metrics.value(MetricName::LikeCount), 3);
        assert_eq!(metrics.value(MetricName::ViewCount), 0);
    }
}
