use std::collections::HashMap;
use std::sync::Arc;

use forum_domain::DomainResult;
use forum_domain::error::DomainError;
use forum_domain::metrics::{
    ContentMetrics, IncrementOutcome, MetricName, ensure_non_negative, rank_by_value,
};
use forum_domain::ports::BoxFuture;
use forum_domain::ports::metrics::MetricStore;
use forum_domain::ports::relations::RelationLedger;
use forum_domain::relations::{Relation, RelationKey, RelationKind, sort_recent_first};
use serde::Deserialize;
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;
use surrealdb::method::Query;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

fn map_surreal_error(err: surrealdb::Error) -> DomainError {
    let error_message = err.to_string().to_lowercase();
    if error_message.contains("already exists")
        || error_message.contains("already contains")
        || error_message.contains("duplicate")
        || error_message.contains("unique")
    {
        return DomainError::Conflict;
    }
    DomainError::Storage(format!("surreal query failed: {error_message}"))
}

fn invalid_result(err: surrealdb::Error) -> DomainError {
    DomainError::Storage(format!("invalid query result: {err}"))
}

fn to_rfc3339(timestamp_ms: i64) -> DomainResult<String> {
    let dt = OffsetDateTime::from_unix_timestamp_nanos(timestamp_ms as i128 * 1_000_000)
        .map_err(|err| DomainError::InvalidArgument(format!("invalid timestamp: {err}")))?;
    Ok(dt
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string()))
}

fn parse_datetime_ms(value: &str) -> DomainResult<i64> {
    let datetime = OffsetDateTime::parse(value, &Rfc3339).map_err(|err| {
        DomainError::Storage(format!("invalid relation datetime '{value}': {err}"))
    })?;
    Ok((datetime.unix_timestamp_nanos() / 1_000_000) as i64)
}

fn value_as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_u64().and_then(|number| i64::try_from(number).ok()))
        .or_else(|| value.as_f64().map(|number| number as i64))
}

fn decode_ids(rows: Vec<Value>) -> DomainResult<Vec<i64>> {
    let mut ids = rows
        .iter()
        .map(|row| {
            value_as_i64(row)
                .ok_or_else(|| DomainError::Storage(format!("invalid id in query result: {row}")))
        })
        .collect::<DomainResult<Vec<i64>>>()?;
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

fn decode_total(rows: &[Value]) -> i64 {
    rows.first()
        .and_then(|row| row.get("total"))
        .and_then(value_as_i64)
        .unwrap_or(0)
}

async fn run<'a>(query: Query<'a, Client>) -> DomainResult<surrealdb::Response> {
    query
        .await
        .map_err(map_surreal_error)?
        .check()
        .map_err(map_surreal_error)
}

#[derive(Clone)]
pub struct SurrealRelationLedger {
    client: Arc<Surreal<Client>>,
}

#[derive(Debug, Deserialize)]
struct SurrealRelationRow {
    user_id: i64,
    content_id: i64,
    kind: String,
    created_at: String,
}

impl SurrealRelationLedger {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn map_row(row: SurrealRelationRow) -> DomainResult<Relation> {
        let kind = row.kind.parse::<RelationKind>().map_err(|_| {
            DomainError::Storage(format!("invalid relation kind '{}' in ledger", row.kind))
        })?;
        Ok(Relation {
            user_id: row.user_id,
            content_id: row.content_id,
            kind,
            created_at_ms: parse_datetime_ms(&row.created_at)?,
        })
    }

    fn decode_rows(rows: Vec<Value>) -> DomainResult<Vec<Relation>> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<SurrealRelationRow>(row)
                    .map_err(|err| DomainError::Storage(format!("invalid relation row: {err}")))
                    .and_then(Self::map_row)
            })
            .collect()
    }

    async fn recent(
        &self,
        filter_field: &'static str,
        filter_value: i64,
        kind: RelationKind,
        limit: usize,
    ) -> DomainResult<Vec<Relation>> {
        let statement = format!(
            "SELECT user_id, content_id, kind, <string>created_at AS created_at, created_at AS ts \
             FROM content_relation WHERE {filter_field} = $filter_value AND kind = $kind \
             ORDER BY ts DESC LIMIT $limit"
        );
        let mut response = run(self
            .client
            .query(statement)
            .bind(("filter_value", filter_value))
            .bind(("kind", kind.as_str()))
            .bind(("limit", limit as i64)))
        .await?;
        let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
        let mut relations = Self::decode_rows(rows)?;
        sort_recent_first(&mut relations);
        Ok(relations)
    }

    async fn count_where(
        &self,
        condition: &'static str,
        user_id: Option<i64>,
        content_id: Option<i64>,
        kind: RelationKind,
    ) -> DomainResult<i64> {
        let statement = format!(
            "SELECT count() AS total FROM content_relation WHERE {condition} GROUP ALL"
        );
        let mut response = run(self
            .client
            .query(statement)
            .bind(("user_id", user_id))
            .bind(("content_id", content_id))
            .bind(("kind", kind.as_str())))
        .await?;
        let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
        Ok(decode_total(&rows))
    }
}

impl RelationLedger for SurrealRelationLedger {
    fn insert(&self, relation: &Relation) -> BoxFuture<'_, DomainResult<Relation>> {
        let relation = relation.clone();
        Box::pin(async move {
            let created_at = to_rfc3339(relation.created_at_ms)?;
            run(self
                .client
                .query(
                    "CREATE type::record('content_relation', $record_key) SET \
                        user_id = $user_id, \
                        content_id = $content_id, \
                        kind = $kind, \
                        created_at = <datetime>$created_at \
                     RETURN NONE",
                )
                .bind(("record_key", relation.key().storage_key()))
                .bind(("user_id", relation.user_id))
                .bind(("content_id", relation.content_id))
                .bind(("kind", relation.kind.as_str()))
                .bind(("created_at", created_at)))
            .await?;
            Ok(relation)
        })
    }

    fn delete(&self, key: &RelationKey) -> BoxFuture<'_, DomainResult<bool>> {
        let record_key = key.storage_key();
        Box::pin(async move {
            let mut response = run(self
                .client
                .query("DELETE type::record('content_relation', $record_key) RETURN BEFORE")
                .bind(("record_key", record_key)))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Ok(!rows.is_empty())
        })
    }

    fn exists(&self, key: &RelationKey) -> BoxFuture<'_, DomainResult<bool>> {
        let key = *key;
        Box::pin(async move {
            let total = self
                .count_where(
                    "user_id = $user_id AND content_id = $content_id AND kind = $kind",
                    Some(key.user_id),
                    Some(key.content_id),
                    key.kind,
                )
                .await?;
            Ok(total > 0)
        })
    }

    fn count_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<i64>> {
        Box::pin(async move {
            self.count_where(
                "content_id = $content_id AND kind = $kind",
                None,
                Some(content_id),
                kind,
            )
            .await
        })
    }

    fn user_ids_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        Box::pin(async move {
            let mut response = run(self
                .client
                .query(
                    "SELECT VALUE user_id FROM content_relation \
                     WHERE content_id = $content_id AND kind = $kind",
                )
                .bind(("content_id", content_id))
                .bind(("kind", kind.as_str())))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            decode_ids(rows)
        })
    }

    fn content_ids_by_user(
        &self,
        user_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        Box::pin(async move {
            let mut response = run(self
                .client
                .query(
                    "SELECT VALUE content_id FROM content_relation \
                     WHERE user_id = $user_id AND kind = $kind",
                )
                .bind(("user_id", user_id))
                .bind(("kind", kind.as_str())))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            decode_ids(rows)
        })
    }

    fn related_subset(
        &self,
        user_id: i64,
        content_ids: &[i64],
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        let content_ids = content_ids.to_vec();
        Box::pin(async move {
            if content_ids.is_empty() {
                return Ok(Vec::new());
            }
            let mut response = run(self
                .client
                .query(
                    "SELECT VALUE content_id FROM content_relation \
                     WHERE user_id = $user_id AND kind = $kind AND content_id IN $content_ids",
                )
                .bind(("user_id", user_id))
                .bind(("kind", kind.as_str()))
                .bind(("content_ids", content_ids)))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            decode_ids(rows)
        })
    }

    fn recent_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<Relation>>> {
        Box::pin(async move { self.recent("content_id", content_id, kind, limit).await })
    }

    fn recent_by_user(
        &self,
        user_id: i64,
        kind: RelationKind,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<Relation>>> {
        Box::pin(async move { self.recent("user_id", user_id, kind, limit).await })
    }

    fn delete_by_content(
        &self,
        content_id: i64,
        kind: RelationKind,
    ) -> BoxFuture<'_, DomainResult<u64>> {
        Box::pin(async move {
            let mut response = run(self
                .client
                .query(
                    "DELETE content_relation WHERE content_id = $content_id AND kind = $kind \
                     RETURN BEFORE",
                )
                .bind(("content_id", content_id))
                .bind(("kind", kind.as_str())))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Ok(rows.len() as u64)
        })
    }

    fn delete_by_user(&self, user_id: i64, kind: RelationKind) -> BoxFuture<'_, DomainResult<u64>> {
        Box::pin(async move {
            let mut response = run(self
                .client
                .query(
                    "DELETE content_relation WHERE user_id = $user_id AND kind = $kind \
                     RETURN BEFORE",
                )
                .bind(("user_id", user_id))
                .bind(("kind", kind.as_str())))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Ok(rows.len() as u64)
        })
    }
}

#[derive(Clone)]
pub struct SurrealMetricStore {
    client: Arc<Surreal<Client>>,
}

#[derive(Debug, Deserialize)]
struct SurrealMetricRow {
    content_id: i64,
    metric: String,
    metric_value: i64,
}

impl SurrealMetricStore {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn record_key(content_id: i64, metric: MetricName) -> String {
        format!("{content_id}_{}", metric.as_str())
    }

    fn decode_rows(rows: Vec<Value>) -> DomainResult<Vec<SurrealMetricRow>> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<SurrealMetricRow>(row)
                    .map_err(|err| DomainError::Storage(format!("invalid metric row: {err}")))
            })
            .collect()
    }
}

impl MetricStore for SurrealMetricStore {
    fn get(&self, content_id: i64, metric: MetricName) -> BoxFuture<'_, DomainResult<i64>> {
        Box::pin(async move {
            let mut response = run(self
                .client
                .query(
                    "SELECT content_id, metric, metric_value FROM content_metric \
                     WHERE content_id = $content_id AND metric = $metric LIMIT 1",
                )
                .bind(("content_id", content_id))
                .bind(("metric", metric.as_str())))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Ok(Self::decode_rows(rows)?
                .first()
                .map(|row| row.metric_value)
                .unwrap_or(0))
        })
    }

    fn get_all(&self, content_id: i64) -> BoxFuture<'_, DomainResult<ContentMetrics>> {
        Box::pin(async move {
            let mut response = run(self
                .client
                .query(
                    "SELECT content_id, metric, metric_value FROM content_metric \
                     WHERE content_id = $content_id",
                )
                .bind(("content_id", content_id)))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            let mut metrics = ContentMetrics::empty(content_id);
            for row in Self::decode_rows(rows)? {
                match row.metric.parse::<MetricName>() {
                    Ok(metric) => metrics = metrics.with_value(metric, row.metric_value),
                    Err(_) => {
                        tracing::warn!(content_id, metric = %row.metric, "unknown metric row ignored");
                    }
                }
            }
            Ok(metrics)
        })
    }

    fn set(
        &self,
        content_id: i64,
        metric: MetricName,
        value: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        Box::pin(async move {
            ensure_non_negative(metric, value)?;
            run(self
                .client
                .query(
                    "UPSERT type::record('content_metric', $record_key) SET \
                        content_id = $content_id, \
                        metric = $metric, \
                        metric_value = $metric_value \
                     RETURN NONE",
                )
                .bind(("record_key", Self::record_key(content_id, metric)))
                .bind(("content_id", content_id))
                .bind(("metric", metric.as_str()))
                .bind(("metric_value", value)))
            .await?;
            Ok(())
        })
    }

    fn increment(
        &self,
        content_id: i64,
        metric: MetricName,
        delta: i64,
    ) -> BoxFuture<'_, DomainResult<IncrementOutcome>> {
        Box::pin(async move {
            // Read-modify-write stays inside one statement.
            let mut response = run(self
                .client
                .query(
                    "UPSERT type::record('content_metric', $record_key) SET \
                        content_id = $content_id, \
                        metric = $metric, \
                        metric_value = math::max([(metric_value ?? 0) + $delta, 0]) \
                     RETURN BEFORE",
                )
                .bind(("record_key", Self::record_key(content_id, metric)))
                .bind(("content_id", content_id))
                .bind(("metric", metric.as_str()))
                .bind(("delta", delta)))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            let previous = rows
                .first()
                .and_then(|row| row.get("metric_value"))
                .and_then(value_as_i64)
                .unwrap_or(0);
            Ok(IncrementOutcome::apply(previous, delta))
        })
    }

    fn batch_get(
        &self,
        content_ids: &[i64],
        metric: MetricName,
    ) -> BoxFuture<'_, DomainResult<HashMap<i64, i64>>> {
        let content_ids = content_ids.to_vec();
        Box::pin(async move {
            let mut values: HashMap<i64, i64> = content_ids.iter().map(|id| (*id, 0)).collect();
            if content_ids.is_empty() {
                return Ok(values);
            }
            let mut response = run(self
                .client
                .query(
                    "SELECT content_id, metric, metric_value FROM content_metric \
                     WHERE metric = $metric AND content_id IN $content_ids",
                )
                .bind(("metric", metric.as_str()))
                .bind(("content_ids", content_ids)))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            for row in Self::decode_rows(rows)? {
                values.insert(row.content_id, row.metric_value);
            }
            Ok(values)
        })
    }

    fn top_by_metric(
        &self,
        metric: MetricName,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        Box::pin(async move {
            let mut response = run(self
                .client
                .query(
                    "SELECT content_id, metric, metric_value FROM content_metric \
                     WHERE metric = $metric \
                     ORDER BY metric_value DESC, content_id ASC LIMIT $limit",
                )
                .bind(("metric", metric.as_str()))
                .bind(("limit", limit as i64)))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            let mut entries: Vec<(i64, i64)> = Self::decode_rows(rows)?
                .into_iter()
                .map(|row| (row.content_id, row.metric_value))
                .collect();
            rank_by_value(&mut entries);
            Ok(entries.into_iter().map(|(content_id, _)| content_id).collect())
        })
    }

    fn content_ids(&self, metric: MetricName) -> BoxFuture<'_, DomainResult<Vec<i64>>> {
        Box::pin(async move {
            let mut response = run(self
                .client
                .query("SELECT VALUE content_id FROM content_metric WHERE metric = $metric")
                .bind(("metric", metric.as_str())))
            .await?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            decode_ids(rows)
        })
    }
}
