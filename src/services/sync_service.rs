use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until, timeout};
use tracing::{debug, info};

use crate::{
    dto::matches::{SyncResponse, sync_status},
    error::ServiceError,
    services::{
        sse_events,
        sync_coordinator::{SyncOutcome, SyncTrigger},
    },
    state::{SharedState, match_store::SyncScope},
};

/// Upper bound on an explicit save, waiting for any running cycle included.
const SAVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Run one cycle against whatever storage is installed and report it to SSE subscribers.
pub async fn run_sync(state: &SharedState, trigger: SyncTrigger) -> SyncOutcome {
    let boundary = state.fixture_store().await;
    let outcome = state
        .sync()
        .sync(trigger, state.match_store(), boundary)
        .await;
    sse_events::broadcast_sync_outcome(state, trigger, &outcome);
    outcome
}

/// Background auto-save: two periodic ticks plus the debounced score follow-up.
pub async fn run_periodic(state: SharedState) {
    let config = state.config().sync.clone();
    let mut events_tick = interval(config.event_interval);
    let mut players_tick = interval(config.player_time_interval);
    events_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    players_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Both intervals fire immediately; nothing is dirty at boot.
    events_tick.tick().await;
    players_tick.tick().await;

    let mut score_deadline: Option<Instant> = None;
    info!(?config, "auto-save loop started");

    loop {
        let debounce = async move {
            match score_deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = events_tick.tick() => {
                run_sync(&state, SyncTrigger::Periodic(SyncScope::Events)).await;
            }
            _ = players_tick.tick() => {
                run_sync(&state, SyncTrigger::Periodic(SyncScope::PlayerTimes)).await;
            }
            _ = state.score_changed().notified() => {
                score_deadline = Some(Instant::now() + config.score_debounce);
            }
            _ = debounce => {
                score_deadline = None;
                if run_sync(&state, SyncTrigger::ScoreChanged).await == SyncOutcome::AlreadySyncing {
                    debug!("score sync collided with a running cycle; rescheduling");
                    score_deadline = Some(Instant::now() + config.score_debounce);
                }
            }
        }
    }
}

/// Persist everything now, waiting for a running cycle to finish first.
pub async fn save_now(state: &SharedState) -> Result<SyncResponse, ServiceError> {
    let outcome = timeout(SAVE_TIMEOUT, async {
        loop {
            state.sync().wait_idle().await;
            match run_sync(state, SyncTrigger::Explicit).await {
                SyncOutcome::AlreadySyncing => continue,
                outcome => break outcome,
            }
        }
    })
    .await
    .map_err(|_| ServiceError::Timeout)?;

    let store = state.match_store().read().await;
    Ok(SyncResponse {
        status: sync_status(&outcome).to_string(),
        report: match outcome {
            SyncOutcome::Completed(report) => Some(report),
            _ => None,
        },
        has_unsaved_changes: store.session().has_unsaved_changes,
        unsaved_items: store.unsaved_items_count(),
    })
}

/// Close every running player interval, then save.
pub async fn finish_match(state: &SharedState) -> Result<SyncResponse, ServiceError> {
    let stopped = state.match_store().write().await.stop_all_player_times();
    info!(stopped = stopped.len(), "finishing match");
    save_now(state).await
}
