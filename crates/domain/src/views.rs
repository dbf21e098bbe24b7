use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::DomainResult;
use crate::clock::{Clock, SystemClock};
use crate::error::DomainError;
use crate::ports::BoxFuture;
use crate::ports::views::{ViewWindowError, ViewWindowStore};

const DEFAULT_SWEEP_THRESHOLD: usize = 10_000;

#[derive(Clone, Debug)]
pub struct ViewDedupConfig {
    pub window: Duration,
}

impl Default for ViewDedupConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5 * 60),
        }
    }
}

impl From<ViewWindowError> for DomainError {
    fn from(err: ViewWindowError) -> Self {
        DomainError::Storage(err.to_string())
    }
}

/// Suppresses repeated view increments from the same user within a window.
///
/// Two requests racing on the same pair may both be counted; view counts are
/// advisory so the store only needs to be best effort.
#[derive(Clone)]
pub struct ViewDeduplicator {
    store: Arc<dyn ViewWindowStore>,
    clock: Arc<dyn Clock>,
    config: ViewDedupConfig,
}

impl ViewDeduplicator {
    pub fn new(store: Arc<dyn ViewWindowStore>, config: ViewDedupConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ViewDedupConfig {
        &self.config
    }

    /// `true` starts a fresh window; an open window is kept as is, not
    /// extended.
    pub async fn should_increment_view(&self, user_id: i64, content_id: i64) -> DomainResult<bool> {
        let window_ms = i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX);
        let now_ms = self.clock.now_ms();
        Ok(self
            .store
            .claim(user_id, content_id, now_ms, window_ms)
            .await?)
    }

    pub async fn purge_expired(&self) -> DomainResult<usize> {
        Ok(self.store.purge_expired(self.clock.now_ms()).await?)
    }
}

#[derive(Debug, Default)]
struct WindowState {
    expires_at: HashMap<(i64, i64), i64>,
    // No window expires before this instant.
    next_sweep_ms: i64,
}

impl WindowState {
    fn sweep(&mut self, now_ms: i64) -> usize {
        let before = self.expires_at.len();
        self.expires_at.retain(|_, expires_at_ms| now_ms < *expires_at_ms);
        self.next_sweep_ms = self.expires_at.values().copied().min().unwrap_or(now_ms);
        before - self.expires_at.len()
    }
}

/// Process-local window store. Cleared on restart and not shared between
/// instances.
#[derive(Clone, Debug)]
pub struct InMemoryViewWindowStore {
    inner: Arc<Mutex<WindowState>>,
    sweep_threshold: usize,
}

impl Default for InMemoryViewWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryViewWindowStore {
    pub fn new() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }

    pub fn with_sweep_threshold(sweep_threshold: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WindowState::default())),
            sweep_threshold: sweep_threshold.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|guard| guard.expires_at.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, WindowState>, ViewWindowError> {
        self.inner
            .lock()
            .map_err(|_| ViewWindowError::Store("view window lock poisoned".to_string()))
    }
}

impl ViewWindowStore for InMemoryViewWindowStore {
    fn claim(
        &self,
        user_id: i64,
        content_id: i64,
        now_ms: i64,
        window_ms: i64,
    ) -> BoxFuture<'_, Result<bool, ViewWindowError>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            if let Some(expires_at_ms) = state.expires_at.get(&(user_id, content_id)) {
                if now_ms < *expires_at_ms {
                    return Ok(false);
                }
            }
            let expires_at_ms = now_ms.saturating_add(window_ms);
            state.expires_at.insert((user_id, content_id), expires_at_ms);
            state.next_sweep_ms = state.next_sweep_ms.min(expires_at_ms);
            if state.expires_at.len() > self.sweep_threshold && now_ms >= state.next_sweep_ms {
                state.sweep(now_ms);
            }
            Ok(true)
        })
    }

    fn purge_expired(&self, now_ms: i64) -> BoxFuture<'_, Result<usize, ViewWindowError>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            Ok(state.sweep(now_ms))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn dedup(clock: &ManualClock, store: InMemoryViewWindowStore) -> ViewDeduplicator {
        ViewDeduplicator::new(
            Arc::new(store),
            ViewDedupConfig {
                window: Duration::from_secs(300),
            },
        )
        .with_clock(Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn repeated_view_inside_window_is_suppressed() {
        let clock = ManualClock::new(1_000_000);
        let views = dedup(&clock, InMemoryViewWindowStore::new());

        assert!(views.should_increment_view(7, 42).await.unwrap());
        clock.advance_ms(60_000);
        assert!(!views.should_increment_view(7, 42).await.unwrap());
        clock.advance_ms(239_999);
        assert!(!views.should_increment_view(7, 42).await.unwrap());
        clock.advance_ms(1);
        assert!(views.should_increment_view(7, 42).await.unwrap());
    }

    #[tokio::test]
    async fn suppressed_views_do_not_extend_the_window() {
        let clock = ManualClock::new(0);
        let views = dedup(&clock, InMemoryViewWindowStore::new());

        assert!(views.should_increment_view(1, 2).await.unwrap());
        clock.advance_ms(200_000);
        assert!(!views.should_increment_view(1, 2).await.unwrap());
        clock.advance_ms(100_000);
        assert!(views.should_increment_view(1, 2).await.unwrap());
    }

    #[tokio::test]
    async fn windows_are_tracked_per_user_and_content() {
        let clock = ManualClock::new(0);
        let views = dedup(&clock, InMemoryViewWindowStore::new());

        assert!(views.should_increment_view(1, 10).await.unwrap());
        assert!(views.should_increment_view(2, 10).await.unwrap());
        assert!(views.should_increment_view(1, 11).await.unwrap());
        assert!(!views.should_increment_view(2, 10).await.unwrap());
    }

    #[tokio::test]
    async fn purge_drops_only_expired_windows() {
        let clock = ManualClock::new(0);
        let store = InMemoryViewWindowStore::new();
        let views = dedup(&clock, store.clone());

        views.should_increment_view(1, 1).await.unwrap();
        clock.advance_ms(200_000);
        views.should_increment_view(2, 2).await.unwrap();
        clock.advance_ms(150_000);

        assert_eq!(views.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn store_sweeps_expired_entries_past_threshold() {
        let store = InMemoryViewWindowStore::with_sweep_threshold(2);
        store.claim(1, 1, 0, 10).await.unwrap();
        store.claim(2, 2, 0, 10).await.unwrap();
        store.claim(3, 3, 50, 10).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn threshold_sweep_waits_for_the_earliest_expiry() {
        let store = InMemoryViewWindowStore::with_sweep_threshold(2);
        store.claim(1, 1, 0, 10).await.unwrap();
        store.claim(2, 2, 0, 100).await.unwrap();
        store.claim(3, 3, 5, 100).await.unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.lock().unwrap().next_sweep_ms, 10);

        store.claim(4, 4, 8, 100).await.unwrap();
        assert_eq!(store.len(), 4);

        store.claim(5, 5, 10, 100).await.unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.lock().unwrap().next_sweep_ms, 100);
    }

    #[tokio::test]
    async fn oversized_window_saturates_instead_of_wrapping() {
        let clock = ManualClock::new(1_000);
        let views = ViewDeduplicator::new(
            Arc::new(InMemoryViewWindowStore::new()),
            ViewDedupConfig {
                window: Duration::MAX,
            },
        )
        .with_clock(Arc::new(clock.clone()));

        assert!(views.should_increment_view(1, 2).await.unwrap());
        clock.advance_ms(86_400_000);
        assert!(!views.should_increment_view(1, 2).await.unwrap());
    }
}
