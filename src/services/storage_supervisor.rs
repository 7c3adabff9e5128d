use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{fixture_store::FixtureStore, storage::StorageError},
    services::{sync_coordinator::SyncTrigger, sync_service},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a fixture store installed in the shared state, staying in degraded mode while none is
/// reachable. Changes recorded while degraded are flushed as soon as storage comes back.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn FixtureStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_fixture_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                flush_pending(&state).await;
                delay = INITIAL_DELAY;

                watch_health(&state, store.as_ref()).await;

                warn!("exhausted storage reconnect attempts; dropping the connection");
                state.clear_fixture_store().await;
            }
            Err(err) => warn!(error = %err, "storage connection attempt failed"),
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll `store` until it fails and cannot be revived in place.
async fn watch_health(state: &SharedState, store: &dyn FixtureStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                    flush_pending(state).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect(state, store).await {
                    return;
                }
                state.update_degraded(false);
                flush_pending(state).await;
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Retry [`FixtureStore::try_reconnect`] with backoff; enters degraded mode after the first miss.
async fn reconnect(state: &SharedState, store: &dyn FixtureStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}

async fn flush_pending(state: &SharedState) {
    let has_unsaved = state.match_store().read().await.session().has_unsaved_changes;
    if has_unsaved {
        info!("flushing changes recorded while storage was unavailable");
        sync_service::run_sync(state, SyncTrigger::Explicit).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::fixture_store::memory::InMemoryFixtureStore,
        state::{
            AppState,
            match_store::tests::{fixture, goal_input},
        },
    };

    #[tokio::test]
    async fn changes_recorded_while_degraded_are_flushed_on_connect() {
        let state = AppState::new(AppConfig::default());
        {
            let mut store = state.match_store().write().await;
            store.setup_match(fixture());
            store.add_goal(goal_input("1", 600, false)).unwrap();
        }

        let backend = InMemoryFixtureStore::new();
        let installed: Arc<dyn FixtureStore> = Arc::new(backend.clone());
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let installed = installed.clone();
            async move { Ok::<_, StorageError>(installed) }
        }));

        tokio::time::timeout(Duration::from_secs(2), async {
            while state.match_store().read().await.session().has_unsaved_changes {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(!state.is_degraded());
        assert_eq!(backend.goals().await.len(), 1);
        supervisor.abort();
    }
}
