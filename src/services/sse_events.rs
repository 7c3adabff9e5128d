use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::{
    dto::{
        matches::{CardSummary, GoalSummary, PlayerTimeSummary, TimelineSummary},
        sse::{
            MatchSetUpEvent, NoticeLevel, RemovedEvent, ScoreChangedEvent, SyncNotice,
            SyncStateEvent, SystemStatus,
        },
    },
    services::sync_coordinator::{SyncOutcome, SyncTrigger},
    state::{SharedState, match_store::MatchChange},
};

const EVENT_MATCH_SETUP: &str = "match.setup";
const EVENT_MATCH_RESET: &str = "match.reset";
const EVENT_GOAL_RECORDED: &str = "goal.recorded";
const EVENT_GOAL_UPDATED: &str = "goal.updated";
const EVENT_GOAL_REMOVED: &str = "goal.removed";
const EVENT_CARD_ISSUED: &str = "card.issued";
const EVENT_CARD_UPDATED: &str = "card.updated";
const EVENT_CARD_REMOVED: &str = "card.removed";
const EVENT_PLAYER_TIME: &str = "player_time.changed";
const EVENT_TIMELINE: &str = "timeline.appended";
const EVENT_SCORE: &str = "score.changed";
const EVENT_SYNC_STATE: &str = "sync.state";
const EVENT_SYNC_NOTICE: &str = "sync.notice";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Forward store changes and degraded-mode flips to SSE subscribers until the store goes away.
///
/// Score changes additionally wake the sync loop for a debounced score sync.
pub async fn run_change_relay(state: SharedState) {
    let mut changes = state.match_store().read().await.subscribe();
    let mut degraded = state.degraded_watcher();

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(change) => relay_change(&state, change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change relay lagged; requesting a score sync to catch up");
                    state.request_score_sync();
                }
                Err(RecvError::Closed) => break,
            },
            changed = degraded.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = *degraded.borrow_and_update();
                broadcast_system_status(&state, value);
            }
        }
    }

    debug!("change relay stopped");
}

fn relay_change(state: &SharedState, change: MatchChange) {
    let hub = state.sse();
    match change {
        MatchChange::MatchSetUp { fixture_id } => {
            hub.broadcast_json(EVENT_MATCH_SETUP, &MatchSetUpEvent { fixture_id })
        }
        MatchChange::GoalRecorded(goal) => {
            hub.broadcast_json(EVENT_GOAL_RECORDED, &GoalSummary::from(goal))
        }
        MatchChange::GoalUpdated(goal) => {
            hub.broadcast_json(EVENT_GOAL_UPDATED, &GoalSummary::from(goal))
        }
        MatchChange::GoalRemoved(goal) => {
            hub.broadcast_json(EVENT_GOAL_REMOVED, &RemovedEvent { id: goal.id })
        }
        MatchChange::CardIssued(card) => {
            hub.broadcast_json(EVENT_CARD_ISSUED, &CardSummary::from(card))
        }
        MatchChange::CardUpdated(card) => {
            hub.broadcast_json(EVENT_CARD_UPDATED, &CardSummary::from(card))
        }
        MatchChange::CardRemoved(card) => {
            hub.broadcast_json(EVENT_CARD_REMOVED, &RemovedEvent { id: card.id })
        }
        MatchChange::PlayerTimeChanged(segment) => hub.broadcast_json(
            EVENT_PLAYER_TIME,
            &PlayerTimeSummary::at(&segment, state.clock().now()),
        ),
        MatchChange::TimelineAppended(event) => {
            hub.broadcast_json(EVENT_TIMELINE, &TimelineSummary::from(event))
        }
        MatchChange::ScoreChanged(score) => {
            hub.broadcast_json(EVENT_SCORE, &ScoreChangedEvent::from(score));
            state.request_score_sync();
        }
        MatchChange::SyncStateChanged {
            has_unsaved_changes,
            unsaved,
        } => hub.broadcast_json(
            EVENT_SYNC_STATE,
            &SyncStateEvent {
                has_unsaved_changes,
                unsaved_items: unsaved,
            },
        ),
        MatchChange::Reset => hub.broadcast_json(EVENT_MATCH_RESET, &serde_json::json!({})),
    }
}

/// Broadcast the degraded flag.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    state
        .sse()
        .broadcast_json(EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Turn a sync outcome into a transient notice.
///
/// Background cycles only speak up when something failed; explicit saves always report.
pub fn broadcast_sync_outcome(state: &SharedState, trigger: SyncTrigger, outcome: &SyncOutcome) {
    let explicit = trigger == SyncTrigger::Explicit;
    let notice = match outcome {
        SyncOutcome::Completed(report) if !report.is_success() => Some(SyncNotice {
            level: NoticeLevel::Warning,
            message: format!(
                "{} change(s) could not be saved; they will be retried",
                report.failures.len()
            ),
        }),
        SyncOutcome::Completed(_) | SyncOutcome::Clean if explicit => Some(SyncNotice {
            level: NoticeLevel::Success,
            message: "Match data saved".into(),
        }),
        SyncOutcome::Degraded if explicit => Some(SyncNotice {
            level: NoticeLevel::Error,
            message: "Storage unavailable; changes are kept on this device".into(),
        }),
        _ => None,
    };

    if let Some(notice) = notice {
        state.sse().broadcast_json(EVENT_SYNC_NOTICE, &notice);
    }
}
