use forum_domain::ports::BoxFuture;
use forum_domain::ports::views::{ViewWindowError, ViewWindowStore};
use redis::aio::ConnectionManager;

const DEFAULT_PREFIX: &str = "forum:views";

/// Shared dedup windows backed by Redis key expiry, so every instance sees
/// the same windows. Expiry follows the Redis server clock; the `now_ms`
/// passed in is ignored.
#[derive(Clone)]
pub struct RedisViewWindowStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisViewWindowStore {
    pub async fn connect(redis_url: &str) -> Result<Self, ViewWindowError> {
        Self::connect_with_prefix(redis_url, DEFAULT_PREFIX).await
    }

    pub async fn connect_with_prefix(
        redis_url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, ViewWindowError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| ViewWindowError::Unavailable(err.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| ViewWindowError::Unavailable(err.to_string()))?;
        Ok(Self {
            manager,
            prefix: prefix.into(),
        })
    }

    fn window_key(&self, user_id: i64, content_id: i64) -> String {
        window_key(&self.prefix, user_id, content_id)
    }
}

fn window_key(prefix: &str, user_id: i64, content_id: i64) -> String {
    format!("{prefix}:{user_id}:{content_id}")
}

// Redis rejects expiry times that overflow once added to its clock.
const MAX_TTL_MS: u64 = 100 * 365 * 24 * 60 * 60 * 1000;

fn ttl_ms(window_ms: i64) -> u64 {
    u64::try_from(window_ms).unwrap_or(0).clamp(1, MAX_TTL_MS)
}

impl ViewWindowStore for RedisViewWindowStore {
    fn claim(
        &self,
        user_id: i64,
        content_id: i64,
        _now_ms: i64,
        window_ms: i64,
    ) -> BoxFuture<'_, Result<bool, ViewWindowError>> {
        let key = self.window_key(user_id, content_id);
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let result: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(1)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms(window_ms))
                .query_async(&mut conn)
                .await
                .map_err(|err| ViewWindowError::Store(err.to_string()))?;
            Ok(result.is_some())
        })
    }

    fn purge_expired(&self, _now_ms: i64) -> BoxFuture<'_, Result<usize, ViewWindowError>> {
        Box::pin(async { Ok(0) })
    }
}
