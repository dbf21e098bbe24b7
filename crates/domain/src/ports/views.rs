use thiserror::Error;

use super::BoxFuture;

#[derive(Debug, Error)]
pub enum ViewWindowError {
    #[error("view window store unavailable: {0}")]
    Unavailable(String),
    #[error("view window store error: {0}")]
    Store(String),
}

/// Storage for per (user, content) dedup windows.
pub trait ViewWindowStore: Send + Sync {
    /// Opens a window ending at `now_ms + window_ms` unless an unexpired one
    /// exists. Returns `true` when a new window was opened.
    fn claim(
        &self,
        user_id: i64,
        content_id: i64,
        now_ms: i64,
        window_ms: i64,
    ) -> BoxFuture<'_, Result<bool, ViewWindowError>>;

    /// Drops expired windows, returning how many were removed.
    fn purge_expired(&self, now_ms: i64) -> BoxFuture<'_, Result<usize, ViewWindowError>>;
}
