//! Pushes dirty match entities to the persistence boundary.
//!
//! A cycle never holds the store lock across a network call: it snapshots the dirty
//! entities, releases the lock, pushes, then re-acquires the lock briefly to mark each
//! accepted entity as synced. Entities edited meanwhile keep their dirty flag because
//! their revision moved on.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::future::join_all;
use serde::Serialize;
use tokio::{
    sync::{Notify, RwLock},
    time::sleep,
};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    config::SyncConfig,
    dao::{
        fixture_store::FixtureStore,
        models::{CardEntity, GoalEntity, PlayerTimeEntity, TimelineEntity},
    },
    state::{
        clock::{Clock, Millis},
        match_store::{DirtySnapshot, MatchEventStore, RemovalKind, SyncScope},
        score::Score,
    },
};

const NEVER: Millis = Millis::MAX;

/// What asked for a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Auto-save timer; subject to throttling.
    Periodic(SyncScope),
    /// Debounced follow-up of a score-affecting mutation.
    ScoreChanged,
    /// Referee pressed save or finish.
    Explicit,
}

impl SyncTrigger {
    /// Entities covered by a cycle started by this trigger.
    pub fn scope(self) -> SyncScope {
        match self {
            SyncTrigger::Periodic(scope) => scope,
            SyncTrigger::ScoreChanged => SyncScope::Events,
            SyncTrigger::Explicit => SyncScope::All,
        }
    }
}

/// Entity family a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Goal or assist upsert.
    Goal,
    /// Card upsert.
    Card,
    /// Player-time upsert.
    PlayerTime,
    /// Timeline append.
    Timeline,
    /// Goal deletion.
    GoalRemoval,
    /// Card deletion.
    CardRemoval,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Goal => "goal",
            EntityKind::Card => "card",
            EntityKind::PlayerTime => "player_time",
            EntityKind::Timeline => "timeline",
            EntityKind::GoalRemoval => "goal_removal",
            EntityKind::CardRemoval => "card_removal",
        };
        f.write_str(label)
    }
}

/// One push the boundary did not accept; the entity stays dirty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncFailure {
    /// Family of the entity.
    pub kind: EntityKind,
    /// Entity id, or player id for player time.
    pub id: String,
    /// Error reported by the boundary.
    pub message: String,
}

/// Result of comparing the locally derived score with the fixture's stored counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreReconciliation {
    /// Remote counters already matched.
    InAgreement {
        /// Score on both sides.
        score: Score,
    },
    /// Remote counters were overwritten with the derived score.
    Corrected {
        /// Counters found on the fixture, if any.
        previous: Option<Score>,
        /// Derived score written back.
        score: Score,
    },
    /// The boundary could not be read or written.
    Failed {
        /// Error reported by the boundary.
        message: String,
    },
}

/// Counters of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncReport {
    /// Goals and assists acknowledged.
    pub goals: usize,
    /// Cards acknowledged.
    pub cards: usize,
    /// Removals acknowledged.
    pub removals: usize,
    /// Timeline entries appended.
    pub timeline: usize,
    /// Player-time segments acknowledged.
    pub player_times: usize,
    /// Pushes rejected or failed during the cycle.
    pub failures: Vec<SyncFailure>,
    /// Score reconciliation, when the cycle ran one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreReconciliation>,
    /// Whether the session dirty flag was cleared at the end of the cycle.
    pub clean: bool,
}

impl SyncReport {
    /// Whether every push (and the reconciliation, if any) succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !matches!(self.score, Some(ScoreReconciliation::Failed { .. }))
    }

    fn fail(&mut self, kind: EntityKind, id: impl ToString, message: impl ToString) {
        let failure = SyncFailure {
            kind,
            id: id.to_string(),
            message: message.to_string(),
        };
        warn!(kind = %failure.kind, id = %failure.id, error = %failure.message, "sync push failed");
        self.failures.push(failure);
    }
}

/// How a sync request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another cycle was in flight; the request was dropped.
    AlreadySyncing,
    /// The last attempt for this scope is too recent.
    Throttled { retry_in: Duration },
    /// No persistence backend installed; data stays local.
    Degraded,
    /// No fixture attached.
    Detached,
    /// Nothing dirty in scope.
    Clean,
    /// A cycle ran.
    Completed(SyncReport),
}

/// Single-flight, throttled sync engine shared by every trigger.
pub struct SyncCoordinator {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    in_flight: AtomicBool,
    idle: Notify,
    last_event_attempt: AtomicU64,
    last_player_time_attempt: AtomicU64,
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct InFlight<'a> {
    coordinator: &'a SyncCoordinator,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.coordinator.in_flight.store(false, Ordering::SeqCst);
        self.coordinator.idle.notify_waiters();
    }
}

impl SyncCoordinator {
    pub fn new(config: SyncConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            in_flight: AtomicBool::new(false),
            idle: Notify::new(),
            last_event_attempt: AtomicU64::new(NEVER),
            last_player_time_attempt: AtomicU64::new(NEVER),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether a cycle is running right now.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once no cycle is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_syncing() {
                return;
            }
            notified.await;
        }
    }

    /// Run one cycle for `trigger` against `store`, pushing to `boundary`.
    pub async fn sync(
        &self,
        trigger: SyncTrigger,
        store: &RwLock<MatchEventStore>,
        boundary: Option<Arc<dyn FixtureStore>>,
    ) -> SyncOutcome {
        let scope = trigger.scope();
        let now = self.clock.now();

        if let SyncTrigger::Periodic(scope) = trigger {
            let active_players = store.read().await.session().player_times.active_count();
            if let Some(retry_in) = self.throttled(scope, active_players, now) {
                debug!(?scope, ?retry_in, "sync throttled");
                return SyncOutcome::Throttled { retry_in };
            }
        }

        let Some(_in_flight) = self.begin() else {
            debug!(?trigger, "sync already in flight; request dropped");
            return SyncOutcome::AlreadySyncing;
        };
        self.record_attempt(scope, now);

        let Some(boundary) = boundary else {
            debug!(?trigger, "no storage backend; sync skipped");
            return SyncOutcome::Degraded;
        };

        let snapshot = {
            let mut guard = store.write().await;
            if scope.includes_player_times() {
                guard.update_all_player_times();
            }
            match guard.dirty_snapshot(scope) {
                None => return SyncOutcome::Detached,
                Some(snapshot) if snapshot.is_empty() && !needs_reconciliation(trigger) => {
                    if guard.session().has_unsaved_changes {
                        guard.clear_unsaved_if_clean();
                    }
                    return SyncOutcome::Clean;
                }
                Some(snapshot) => snapshot,
            }
        };

        let report = self
            .push_snapshot(trigger, snapshot, store, boundary.as_ref())
            .await;

        if report.is_success() {
            info!(
                ?trigger,
                goals = report.goals,
                cards = report.cards,
                removals = report.removals,
                timeline = report.timeline,
                player_times = report.player_times,
                clean = report.clean,
                "sync completed"
            );
        } else {
            warn!(
                ?trigger,
                failures = report.failures.len(),
                "sync completed with failures; affected entities stay dirty"
            );
        }
        SyncOutcome::Completed(report)
    }

    async fn push_snapshot(
        &self,
        trigger: SyncTrigger,
        snapshot: DirtySnapshot,
        store: &RwLock<MatchEventStore>,
        boundary: &dyn FixtureStore,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let fixture_id = snapshot.fixture_id.as_str();
        let touches_score = snapshot.touches_score();

        for goal in &snapshot.goals {
            match boundary.upsert_goal(GoalEntity::from((fixture_id, goal))).await {
                Ok(()) => {
                    if store.write().await.mark_goal_synced(goal.id, goal.revision) {
                        report.goals += 1;
                    }
                }
                Err(err) => report.fail(EntityKind::Goal, goal.id, err),
            }
        }

        for removal in &snapshot.removals {
            let (kind, result) = match removal.kind {
                RemovalKind::Goal => (
                    EntityKind::GoalRemoval,
                    boundary.delete_goal(fixture_id.to_owned(), removal.id).await,
                ),
                RemovalKind::Card => (
                    EntityKind::CardRemoval,
                    boundary.delete_card(fixture_id.to_owned(), removal.id).await,
                ),
            };
            match result {
                Ok(()) => {
                    store.write().await.acknowledge_removal(removal.id);
                    report.removals += 1;
                }
                Err(err) => report.fail(kind, removal.id, err),
            }
        }

        for card in &snapshot.cards {
            match boundary.upsert_card(CardEntity::from((fixture_id, card))).await {
                Ok(()) => {
                    if store.write().await.mark_card_synced(card.id, card.revision) {
                        report.cards += 1;
                    }
                }
                Err(err) => report.fail(EntityKind::Card, card.id, err),
            }
        }

        for event in &snapshot.timeline {
            match boundary
                .append_timeline_event(TimelineEntity::from((fixture_id, event)))
                .await
            {
                Ok(()) => {
                    store.write().await.mark_timeline_synced(event.id);
                    report.timeline += 1;
                }
                Err(err) => report.fail(EntityKind::Timeline, event.id, err),
            }
        }

        if touches_score || needs_reconciliation(trigger) {
            report.score = self.reconcile_score(fixture_id, store, boundary).await;
        }

        for (index, chunk) in snapshot
            .player_times
            .chunks(self.config.player_time_chunk_size.max(1))
            .enumerate()
        {
            if index > 0 && !self.config.chunk_delay.is_zero() {
                sleep(self.config.chunk_delay).await;
            }

            let results = join_all(chunk.iter().map(|segment| {
                boundary.upsert_player_time(PlayerTimeEntity::from((fixture_id, segment)))
            }))
            .await;

            let mut guard = store.write().await;
            for (segment, result) in chunk.iter().zip(results) {
                match result {
                    Ok(()) => {
                        if guard.mark_player_time_synced(&segment.player_id, segment.revision) {
                            report.player_times += 1;
                        }
                    }
                    Err(err) => report.fail(EntityKind::PlayerTime, &segment.player_id, err),
                }
            }
        }

        report.clean = store.write().await.clear_unsaved_if_clean();
        report
    }

    /// Make the fixture's stored counters equal to the score derived from the goal list.
    ///
    /// Returns `None` when the session moved to another fixture during the cycle.
    async fn reconcile_score(
        &self,
        fixture_id: &str,
        store: &RwLock<MatchEventStore>,
        boundary: &dyn FixtureStore,
    ) -> Option<ScoreReconciliation> {
        let derived = {
            let mut guard = store.write().await;
            let attached = guard
                .session()
                .fixture
                .as_ref()
                .is_some_and(|fixture| fixture.id == fixture_id);
            if !attached {
                debug!(fixture_id, "fixture changed during sync; score left untouched");
                return None;
            }
            guard.correct_score();
            guard.derived_score()
        };

        let remote = match boundary.read_fixture_score(fixture_id.to_owned()).await {
            Ok(remote) => remote.map(Score::from),
            Err(err) => {
                warn!(fixture_id, error = %err, "failed to read stored score");
                return Some(ScoreReconciliation::Failed {
                    message: err.to_string(),
                });
            }
        };

        if remote == Some(derived) {
            return Some(ScoreReconciliation::InAgreement { score: derived });
        }

        let outcome = match boundary
            .write_fixture_score(fixture_id.to_owned(), derived.into())
            .await
        {
            Ok(()) => {
                info!(
                    fixture_id,
                    previous = ?remote,
                    score = ?derived,
                    "stored score corrected from goal events"
                );
                ScoreReconciliation::Corrected {
                    previous: remote,
                    score: derived,
                }
            }
            Err(err) => {
                warn!(fixture_id, error = %err, "failed to write derived score");
                ScoreReconciliation::Failed {
                    message: err.to_string(),
                }
            }
        };
        Some(outcome)
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight { coordinator: self })
    }

    /// Remaining wait before a periodic cycle for `scope` may run.
    fn throttled(&self, scope: SyncScope, active_players: usize, now: Millis) -> Option<Duration> {
        let (last, window) = match scope {
            SyncScope::PlayerTimes => (
                &self.last_player_time_attempt,
                self.config.player_time_window(active_players),
            ),
            SyncScope::Events | SyncScope::All => {
                (&self.last_event_attempt, self.config.event_min_gap)
            }
        };

        let last = last.load(Ordering::SeqCst);
        if last == NEVER {
            return None;
        }
        let elapsed = Duration::from_millis(now.saturating_sub(last));
        (elapsed < window).then(|| window - elapsed)
    }

    fn record_attempt(&self, scope: SyncScope, now: Millis) {
        if scope.includes_events() {
            self.last_event_attempt.store(now, Ordering::SeqCst);
        }
        if scope.includes_player_times() {
            self.last_player_time_attempt.store(now, Ordering::SeqCst);
        }
    }
}

/// Score-driven and explicit cycles always compare counters, even with no dirty goal.
fn needs_reconciliation(trigger: SyncTrigger) -> bool {
    matches!(trigger, SyncTrigger::ScoreChanged | SyncTrigger::Explicit)
}
