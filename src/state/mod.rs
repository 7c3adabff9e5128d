pub mod clock;
pub mod dedup;
pub mod events;
pub mod ids;
pub mod local_buffer;
pub mod match_store;
pub mod player_time;
pub mod score;
mod sse;

use std::sync::Arc;

use tokio::sync::{Notify, RwLock, watch};

use crate::{
    config::AppConfig,
    dao::fixture_store::FixtureStore,
    error::ServiceError,
    services::sync_coordinator::SyncCoordinator,
    state::{
        clock::{Clock, SystemClock},
        match_store::MatchEventStore,
    },
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// Central application state: the match being officiated, its sync engine and the storage handle.
pub struct AppState {
    fixture_store: RwLock<Option<Arc<dyn FixtureStore>>>,
    match_store: RwLock<MatchEventStore>,
    sync: SyncCoordinator,
    sse: SseHub,
    degraded: watch::Sender<bool>,
    score_changed: Notify,
    clock: Arc<dyn Clock>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            fixture_store: RwLock::new(None),
            match_store: RwLock::new(MatchEventStore::new(clock.clone())),
            sync: SyncCoordinator::new(config.sync.clone(), clock.clone()),
            sse: SseHub::new(SSE_CAPACITY),
            degraded: degraded_tx,
            score_changed: Notify::new(),
            clock,
            config,
        })
    }

    /// Obtain a handle to the current fixture store, if one is installed.
    pub async fn fixture_store(&self) -> Option<Arc<dyn FixtureStore>> {
        let guard = self.fixture_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current fixture store or [`ServiceError::Degraded`].
    pub async fn require_fixture_store(&self) -> Result<Arc<dyn FixtureStore>, ServiceError> {
        self.fixture_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new fixture store implementation and leave degraded mode.
    pub async fn set_fixture_store(&self, store: Arc<dyn FixtureStore>) {
        {
            let mut guard = self.fixture_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current fixture store and enter degraded mode.
    pub async fn clear_fixture_store(&self) {
        {
            let mut guard = self.fixture_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// The match being officiated.
    pub fn match_store(&self) -> &RwLock<MatchEventStore> {
        &self.match_store
    }

    pub fn sync(&self) -> &SyncCoordinator {
        &self.sync
    }

    /// Broadcast hub used for the match SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Ask the sync loop for a debounced score sync.
    pub fn request_score_sync(&self) {
        self.score_changed.notify_one();
    }

    /// Signalled by [`AppState::request_score_sync`].
    pub fn score_changed(&self) -> &Notify {
        &self.score_changed
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::fixture_store::memory::InMemoryFixtureStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_fixture_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_fixture_store(Arc::new(InMemoryFixtureStore::new()))
            .await;

        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_fixture_store().await.is_ok());

        state.clear_fixture_store().await;
        assert!(state.is_degraded());
        assert!(state.fixture_store().await.is_none());
    }
}
