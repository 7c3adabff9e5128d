//! Fixture-scoped, in-memory match event store.
//!
//! Every mutation of a match goes through [`MatchEventStore`]; each one is
//! synchronous, updates the cached score consistently with
//! [`derive_score`], flags the session as dirty and publishes a
//! [`MatchChange`] to subscribers.

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::{
    clock::{Clock, Millis},
    dedup::{GoalFingerprint, find_duplicate},
    events::{
        CardEvent, CardInput, CardPatch, GoalEvent, GoalInput, GoalKind, GoalPatch, PlayerSlot,
        PlayerTimeSegment, TimelineEvent, UnsavedItems,
    },
    ids::IdGenerator,
    local_buffer::BufferedEntry,
    player_time::{PlayerTimeOutcome, PlayerTimeTracker},
    score::{Score, TeamIdentity, benefiting_side, derive_score},
};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Fixture the session is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Identifier of the fixture in the league database.
    pub id: String,
    /// Home team identity.
    pub home: TeamIdentity,
    /// Away team identity.
    pub away: TeamIdentity,
}

/// Entity kinds that can be removed locally and must be removed remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalKind {
    /// Goal or assist.
    Goal,
    /// Card.
    Card,
}

/// Local removal awaiting propagation to the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// Identifier of the removed entity.
    pub id: Uuid,
    /// Kind of the removed entity.
    pub kind: RemovalKind,
}

/// Which dirty subsets a sync cycle covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    /// Goals, cards, removals and timeline entries.
    Events,
    /// Player-time segments.
    PlayerTimes,
    /// Everything.
    All,
}

impl SyncScope {
    /// Whether goals, cards, removals and the timeline are included.
    pub fn includes_events(self) -> bool {
        matches!(self, SyncScope::Events | SyncScope::All)
    }

    /// Whether player-time segments are included.
    pub fn includes_player_times(self) -> bool {
        matches!(self, SyncScope::PlayerTimes | SyncScope::All)
    }
}

/// Aggregate root describing an in-progress match.
#[derive(Debug, Clone, Default)]
pub struct MatchSession {
    /// Fixture the session belongs to, once set up.
    pub fixture: Option<Fixture>,
    /// Cached score, always equal to the derivation from `goals`.
    pub score: Score,
    /// Goals and assists in creation order.
    pub goals: IndexMap<Uuid, GoalEvent>,
    /// Cards in creation order.
    pub cards: IndexMap<Uuid, CardEvent>,
    /// Player-time segments.
    pub player_times: PlayerTimeTracker,
    /// Informational timeline.
    pub timeline: Vec<TimelineEvent>,
    /// Removals not yet propagated.
    pub pending_removals: Vec<Removal>,
    /// Set by every mutation, cleared once nothing is left to persist.
    pub has_unsaved_changes: bool,
    /// Time of the last mutation.
    pub last_updated: Option<Millis>,
}

impl MatchSession {
    /// Home team identity, or an empty identity before setup.
    pub fn home(&self) -> TeamIdentity {
        self.fixture
            .as_ref()
            .map(|fixture| fixture.home.clone())
            .unwrap_or_default()
    }

    /// Away team identity, or an empty identity before setup.
    pub fn away(&self) -> TeamIdentity {
        self.fixture
            .as_ref()
            .map(|fixture| fixture.away.clone())
            .unwrap_or_default()
    }
}

/// Notification published after each mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchChange {
    /// A fixture was attached.
    MatchSetUp {
        /// Fixture identifier.
        fixture_id: String,
    },
    /// A goal or assist was recorded.
    GoalRecorded(GoalEvent),
    /// A goal or assist was edited.
    GoalUpdated(GoalEvent),
    /// A goal or assist was removed.
    GoalRemoved(GoalEvent),
    /// A card was issued.
    CardIssued(CardEvent),
    /// A card was edited.
    CardUpdated(CardEvent),
    /// A card was removed.
    CardRemoved(CardEvent),
    /// A player-time segment changed.
    PlayerTimeChanged(PlayerTimeSegment),
    /// A timeline entry was appended.
    TimelineAppended(TimelineEvent),
    /// The score changed.
    ScoreChanged(Score),
    /// Dirty bookkeeping changed after a sync.
    SyncStateChanged {
        /// Session-level dirty flag.
        has_unsaved_changes: bool,
        /// Remaining unsaved entities.
        unsaved: UnsavedItems,
    },
    /// The session was cleared.
    Reset,
}

/// Reason a goal or assist was not inserted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoalRejection {
    /// Same player, minute, team, kind and own-goal flag as an existing entry.
    #[error("duplicate of goal `{existing}`")]
    Duplicate {
        /// Identifier of the entry already recorded.
        existing: Uuid,
    },
}

/// Dirty entities captured at the start of a sync cycle.
#[derive(Debug, Clone, Default)]
pub struct DirtySnapshot {
    /// Fixture the entities belong to.
    pub fixture_id: String,
    /// Unsynced goals and assists, in creation order.
    pub goals: Vec<GoalEvent>,
    /// Unsynced cards, in creation order.
    pub cards: Vec<CardEvent>,
    /// Removals awaiting propagation.
    pub removals: Vec<Removal>,
    /// Unsynced player-time segments.
    pub player_times: Vec<PlayerTimeSegment>,
    /// Timeline entries not appended remotely yet.
    pub timeline: Vec<TimelineEvent>,
}

impl DirtySnapshot {
    /// Whether the snapshot holds nothing to push.
    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
            && self.cards.is_empty()
            && self.removals.is_empty()
            && self.player_times.is_empty()
            && self.timeline.is_empty()
    }

    /// Whether pushing this snapshot may change the remote score.
    pub fn touches_score(&self) -> bool {
        !self.goals.is_empty()
            || self
                .removals
                .iter()
                .any(|removal| removal.kind == RemovalKind::Goal)
    }
}

/// Outcome of [`MatchEventStore::absorb`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsorbReport {
    /// Entries applied to the store.
    pub applied: usize,
    /// Entries dropped (duplicates or unknown ids).
    pub rejected: usize,
}

/// Authoritative in-memory state of the match currently being officiated.
pub struct MatchEventStore {
    session: MatchSession,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    changes: broadcast::Sender<MatchChange>,
}

impl MatchEventStore {
    /// Create an empty, detached store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (changes, _receiver) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            session: MatchSession::default(),
            ids: IdGenerator::new(clock.clone()),
            clock,
            changes,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchChange> {
        self.changes.subscribe()
    }

    /// Read-only view of the session.
    pub fn session(&self) -> &MatchSession {
        &self.session
    }

    /// Current time according to the store clock.
    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    /// Attach the store to a fixture.
    ///
    /// Re-attaching the fixture already loaded keeps its events and only refreshes
    /// team identities; switching fixtures starts from an empty session.
    pub fn setup_match(&mut self, fixture: Fixture) {
        let same_fixture = self
            .session
            .fixture
            .as_ref()
            .is_some_and(|current| current.id == fixture.id);

        if !same_fixture {
            self.clear_collections();
        }

        let fixture_id = fixture.id.clone();
        self.session.fixture = Some(fixture);
        self.emit(MatchChange::MatchSetUp { fixture_id });
        self.recompute_score();
    }

    /// Record a goal.
    pub fn add_goal(&mut self, input: GoalInput) -> Result<GoalEvent, GoalRejection> {
        self.insert_goal(input, GoalKind::Goal)
    }

    /// Record an assist. Assists never change the score.
    pub fn add_assist(&mut self, input: GoalInput) -> Result<GoalEvent, GoalRejection> {
        self.insert_goal(input, GoalKind::Assist)
    }

    fn insert_goal(&mut self, input: GoalInput, kind: GoalKind) -> Result<GoalEvent, GoalRejection> {
        let fingerprint = GoalFingerprint::of_input(&input, kind);
        if let Some(existing) = find_duplicate(self.session.goals.values(), &fingerprint) {
            warn!(
                existing = %existing.id,
                player = %input.player_name,
                match_time = input.match_time_seconds,
                ?kind,
                "duplicate goal rejected"
            );
            return Err(GoalRejection::Duplicate {
                existing: existing.id,
            });
        }

        let goal = GoalEvent {
            id: self.ids.next_id(),
            player_id: input.player_id,
            player_name: input.player_name,
            team_id: input.team_id,
            team_name: input.team_name,
            side: input.side,
            kind,
            match_time_seconds: input.match_time_seconds,
            created_at: self.clock.now(),
            is_own_goal: input.is_own_goal,
            assisted_by: input.assisted_by,
            synced: false,
            revision: 0,
        };

        self.session.goals.insert(goal.id, goal.clone());
        self.mark_dirty();
        self.emit(MatchChange::GoalRecorded(goal.clone()));
        self.apply_goal_to_score(&goal, true);
        Ok(goal)
    }

    /// Merge `patch` into an existing goal. The edit always invalidates prior persistence.
    pub fn update_goal(&mut self, id: Uuid, patch: GoalPatch) -> Option<GoalEvent> {
        let Some(goal) = self.session.goals.get_mut(&id) else {
            warn!(goal_id = %id, "goal not found; update ignored");
            return None;
        };

        patch.apply(goal);
        goal.synced = false;
        goal.revision = goal.revision.wrapping_add(1);
        let updated = goal.clone();

        self.mark_dirty();
        self.emit(MatchChange::GoalUpdated(updated.clone()));
        self.recompute_score();
        Some(updated)
    }

    /// Remove a goal and reverse its score contribution.
    pub fn remove_goal(&mut self, id: Uuid) -> Option<GoalEvent> {
        let Some(goal) = self.session.goals.shift_remove(&id) else {
            warn!(goal_id = %id, "goal not found; removal ignored");
            return None;
        };

        self.session.pending_removals.push(Removal {
            id,
            kind: RemovalKind::Goal,
        });
        self.mark_dirty();
        self.emit(MatchChange::GoalRemoved(goal.clone()));
        self.apply_goal_to_score(&goal, false);
        Some(goal)
    }

    /// Undo a goal; same as [`MatchEventStore::remove_goal`].
    pub fn undo_goal(&mut self, id: Uuid) -> Option<GoalEvent> {
        self.remove_goal(id)
    }

    /// Issue a card. Cards are never deduplicated.
    pub fn add_card(&mut self, input: CardInput) -> CardEvent {
        let card = CardEvent {
            id: self.ids.next_id(),
            player_id: input.player_id,
            player_name: input.player_name,
            team_id: input.team_id,
            team_name: input.team_name,
            side: input.side,
            card_type: input.card_type,
            match_time_seconds: input.match_time_seconds,
            created_at: self.clock.now(),
            synced: false,
            revision: 0,
        };

        self.session.cards.insert(card.id, card.clone());
        self.mark_dirty();
        self.emit(MatchChange::CardIssued(card.clone()));
        card
    }

    /// Merge `patch` into an existing card.
    pub fn update_card(&mut self, id: Uuid, patch: CardPatch) -> Option<CardEvent> {
        let Some(card) = self.session.cards.get_mut(&id) else {
            warn!(card_id = %id, "card not found; update ignored");
            return None;
        };

        patch.apply(card);
        card.synced = false;
        card.revision = card.revision.wrapping_add(1);
        let updated = card.clone();

        self.mark_dirty();
        self.emit(MatchChange::CardUpdated(updated.clone()));
        Some(updated)
    }

    /// Remove a card.
    pub fn remove_card(&mut self, id: Uuid) -> Option<CardEvent> {
        let Some(card) = self.session.cards.shift_remove(&id) else {
            warn!(card_id = %id, "card not found; removal ignored");
            return None;
        };

        self.session.pending_removals.push(Removal {
            id,
            kind: RemovalKind::Card,
        });
        self.mark_dirty();
        self.emit(MatchChange::CardRemoved(card.clone()));
        Some(card)
    }

    /// Put a player on the field.
    pub fn start_player_time(&mut self, slot: PlayerSlot) -> PlayerTimeOutcome {
        let player_id = slot.player_id.clone();
        let now = self.clock.now();
        let outcome = self.session.player_times.start(slot, now, &self.ids);
        self.after_player_time(&player_id, outcome);
        outcome
    }

    /// Take a player off the field.
    pub fn stop_player_time(&mut self, player_id: &str) -> PlayerTimeOutcome {
        let now = self.clock.now();
        let outcome = self.session.player_times.stop(player_id, now);
        self.after_player_time(player_id, outcome);
        outcome
    }

    /// Start or stop a player depending on whether they are playing.
    pub fn toggle_player_time(&mut self, player_id: &str) -> PlayerTimeOutcome {
        let now = self.clock.now();
        let outcome = self.session.player_times.toggle(player_id, now);
        self.after_player_time(player_id, outcome);
        outcome
    }

    /// Fold running intervals into totals without closing them.
    pub fn update_all_player_times(&mut self) -> Vec<String> {
        let now = self.clock.now();
        let refreshed = self.session.player_times.fold_running(now);
        self.after_bulk_player_time(&refreshed);
        refreshed
    }

    /// Stop every player currently on the field.
    pub fn stop_all_player_times(&mut self) -> Vec<String> {
        let now = self.clock.now();
        let stopped = self.session.player_times.stop_all(now);
        self.after_bulk_player_time(&stopped);
        stopped
    }

    /// Append an informational timeline entry.
    pub fn add_event(
        &mut self,
        kind: impl Into<String>,
        description: impl Into<String>,
        match_time_seconds: u32,
    ) -> TimelineEvent {
        let event = TimelineEvent {
            id: self.ids.next_id(),
            kind: kind.into(),
            description: description.into(),
            match_time_seconds,
            created_at: self.clock.now(),
            synced: false,
        };

        self.session.timeline.push(event.clone());
        self.mark_dirty();
        self.emit(MatchChange::TimelineAppended(event.clone()));
        event
    }

    /// Counts of entities not yet persisted.
    pub fn unsaved_items_count(&self) -> UnsavedItems {
        UnsavedItems {
            goals: self.session.goals.values().filter(|g| !g.synced).count(),
            cards: self.session.cards.values().filter(|c| !c.synced).count(),
            player_times: self.session.player_times.unsynced_count(),
            removals: self.session.pending_removals.len(),
        }
    }

    /// Score computed from the goal list.
    pub fn derived_score(&self) -> Score {
        derive_score(
            self.session.goals.values(),
            &self.session.home(),
            &self.session.away(),
        )
    }

    /// Clear all events and the score, keeping the fixture.
    pub fn reset_state(&mut self) {
        self.clear_collections();
        self.emit(MatchChange::Reset);
    }

    /// Clear all events and the score, and detach the fixture.
    pub fn reset_match(&mut self) {
        self.clear_collections();
        self.session.fixture = None;
        self.emit(MatchChange::Reset);
    }

    /// Capture the dirty entities covered by `scope`.
    ///
    /// Returns `None` while no fixture is attached since nothing can be addressed remotely.
    pub fn dirty_snapshot(&self, scope: SyncScope) -> Option<DirtySnapshot> {
        let fixture = self.session.fixture.as_ref()?;
        let mut snapshot = DirtySnapshot {
            fixture_id: fixture.id.clone(),
            ..DirtySnapshot::default()
        };

        if scope.includes_events() {
            snapshot.goals = self
                .session
                .goals
                .values()
                .filter(|g| !g.synced)
                .cloned()
                .collect();
            snapshot.cards = self
                .session
                .cards
                .values()
                .filter(|c| !c.synced)
                .cloned()
                .collect();
            snapshot.removals = self.session.pending_removals.clone();
            snapshot.timeline = self
                .session
                .timeline
                .iter()
                .filter(|e| !e.synced)
                .cloned()
                .collect();
        }

        if scope.includes_player_times() {
            snapshot.player_times = self
                .session
                .player_times
                .iter()
                .filter(|s| !s.synced)
                .cloned()
                .collect();
        }

        Some(snapshot)
    }

    /// Mark a goal persisted, unless it changed since `revision`.
    pub fn mark_goal_synced(&mut self, id: Uuid, revision: u32) -> bool {
        match self.session.goals.get_mut(&id) {
            Some(goal) if goal.revision == revision => {
                goal.synced = true;
                true
            }
            _ => false,
        }
    }

    /// Mark a card persisted, unless it changed since `revision`.
    pub fn mark_card_synced(&mut self, id: Uuid, revision: u32) -> bool {
        match self.session.cards.get_mut(&id) {
            Some(card) if card.revision == revision => {
                card.synced = true;
                true
            }
            _ => false,
        }
    }

    /// Mark a player-time segment persisted, unless it changed since `revision`.
    pub fn mark_player_time_synced(&mut self, player_id: &str, revision: u32) -> bool {
        self.session.player_times.mark_synced(player_id, revision)
    }

    /// Mark a timeline entry appended remotely.
    pub fn mark_timeline_synced(&mut self, id: Uuid) -> bool {
        match self.session.timeline.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                event.synced = true;
                true
            }
            None => false,
        }
    }

    /// Forget a removal once the boundary confirmed it.
    pub fn acknowledge_removal(&mut self, id: Uuid) -> bool {
        let before = self.session.pending_removals.len();
        self.session.pending_removals.retain(|removal| removal.id != id);
        before != self.session.pending_removals.len()
    }

    /// Replace the cached score with the derived one when they disagree.
    pub fn correct_score(&mut self) -> Option<Score> {
        let derived = self.derived_score();
        if derived == self.session.score {
            return None;
        }

        warn!(
            cached = ?self.session.score,
            derived = ?derived,
            "cached score diverged from goal events; using derived score"
        );
        self.session.score = derived;
        self.emit(MatchChange::ScoreChanged(derived));
        Some(derived)
    }

    /// Clear the session dirty flag if goals, cards, segments and removals are all persisted.
    pub fn clear_unsaved_if_clean(&mut self) -> bool {
        let unsaved = self.unsaved_items_count();
        if unsaved.is_empty() {
            self.session.has_unsaved_changes = false;
        }
        self.emit(MatchChange::SyncStateChanged {
            has_unsaved_changes: self.session.has_unsaved_changes,
            unsaved,
        });
        !self.session.has_unsaved_changes
    }

    /// Apply entries flushed from a [`crate::state::local_buffer::LocalBuffer`], in order.
    pub fn absorb<I>(&mut self, entries: I) -> AbsorbReport
    where
        I: IntoIterator<Item = BufferedEntry>,
    {
        let mut report = AbsorbReport::default();
        for entry in entries {
            let applied = match entry {
                BufferedEntry::Goal(goal) => self.absorb_goal(goal),
                BufferedEntry::GoalUpdated(goal) => self.absorb_goal_update(goal),
                BufferedEntry::GoalRemoved(id) => self.remove_goal(id).is_some(),
                BufferedEntry::Card(card) => self.absorb_card(card),
                BufferedEntry::CardUpdated(card) => self.absorb_card_update(card),
                BufferedEntry::CardRemoved(id) => self.remove_card(id).is_some(),
                BufferedEntry::PlayerTime(segment) => {
                    let player_id = segment.player_id.clone();
                    let merged = self.session.player_times.merge(segment);
                    if merged {
                        self.mark_dirty();
                        self.emit_segment(&player_id);
                    }
                    merged
                }
                BufferedEntry::Timeline(event) => self.absorb_timeline(event),
            };

            if applied {
                report.applied += 1;
            } else {
                report.rejected += 1;
            }
        }
        debug!(applied = report.applied, rejected = report.rejected, "absorbed buffered entries");
        report
    }

    fn absorb_goal(&mut self, mut goal: GoalEvent) -> bool {
        let fingerprint = GoalFingerprint::of_event(&goal);
        if self.session.goals.contains_key(&goal.id)
            || find_duplicate(self.session.goals.values(), &fingerprint).is_some()
        {
            warn!(goal_id = %goal.id, "buffered goal duplicates a stored goal; skipped");
            return false;
        }

        goal.synced = false;
        self.session.goals.insert(goal.id, goal.clone());
        self.mark_dirty();
        self.emit(MatchChange::GoalRecorded(goal.clone()));
        self.apply_goal_to_score(&goal, true);
        true
    }

    fn absorb_goal_update(&mut self, goal: GoalEvent) -> bool {
        let Some(stored) = self.session.goals.get_mut(&goal.id) else {
            warn!(goal_id = %goal.id, "buffered edit targets an unknown goal; skipped");
            return false;
        };
        let unchanged = GoalEvent {
            synced: stored.synced,
            revision: stored.revision,
            ..goal.clone()
        } == *stored;
        if unchanged {
            debug!(goal_id = %goal.id, "buffered goal edit already applied");
            return false;
        }

        *stored = GoalEvent {
            synced: false,
            revision: stored.revision.wrapping_add(1),
            ..goal
        };
        let updated = stored.clone();
        self.mark_dirty();
        self.emit(MatchChange::GoalUpdated(updated));
        self.recompute_score();
        true
    }

    fn absorb_card(&mut self, mut card: CardEvent) -> bool {
        if self.session.cards.contains_key(&card.id) {
            warn!(card_id = %card.id, "buffered card already stored; skipped");
            return false;
        }

        card.synced = false;
        self.session.cards.insert(card.id, card.clone());
        self.mark_dirty();
        self.emit(MatchChange::CardIssued(card));
        true
    }

    fn absorb_card_update(&mut self, card: CardEvent) -> bool {
        let Some(stored) = self.session.cards.get_mut(&card.id) else {
            warn!(card_id = %card.id, "buffered edit targets an unknown card; skipped");
            return false;
        };
        let unchanged = CardEvent {
            synced: stored.synced,
            revision: stored.revision,
            ..card.clone()
        } == *stored;
        if unchanged {
            debug!(card_id = %card.id, "buffered card edit already applied");
            return false;
        }

        *stored = CardEvent {
            synced: false,
            revision: stored.revision.wrapping_add(1),
            ..card
        };
        let updated = stored.clone();
        self.mark_dirty();
        self.emit(MatchChange::CardUpdated(updated));
        true
    }

    fn absorb_timeline(&mut self, mut event: TimelineEvent) -> bool {
        if self.session.timeline.iter().any(|stored| stored.id == event.id) {
            warn!(event_id = %event.id, "buffered timeline entry already stored; skipped");
            return false;
        }

        event.synced = false;
        self.session.timeline.push(event.clone());
        self.mark_dirty();
        self.emit(MatchChange::TimelineAppended(event));
        true
    }

    fn apply_goal_to_score(&mut self, goal: &GoalEvent, added: bool) {
        let Some(side) = benefiting_side(goal, &self.session.home(), &self.session.away()) else {
            return;
        };

        if added {
            self.session.score.credit(side);
        } else {
            self.session.score.revoke(side);
        }
        self.emit(MatchChange::ScoreChanged(self.session.score));
    }

    fn recompute_score(&mut self) {
        let derived = self.derived_score();
        if derived != self.session.score {
            self.session.score = derived;
            self.emit(MatchChange::ScoreChanged(derived));
        }
    }

    fn after_player_time(&mut self, player_id: &str, outcome: PlayerTimeOutcome) {
        if outcome.changed() {
            self.mark_dirty();
            self.emit_segment(player_id);
        }
    }

    fn after_bulk_player_time(&mut self, player_ids: &[String]) {
        if player_ids.is_empty() {
            return;
        }
        self.mark_dirty();
        for player_id in player_ids {
            self.emit_segment(player_id);
        }
    }

    fn emit_segment(&self, player_id: &str) {
        if let Some(segment) = self.session.player_times.get(player_id) {
            self.emit(MatchChange::PlayerTimeChanged(segment.clone()));
        }
    }

    fn clear_collections(&mut self) {
        self.session.score = Score::ZERO;
        self.session.goals.clear();
        self.session.cards.clear();
        self.session.player_times.clear();
        self.session.timeline.clear();
        self.session.pending_removals.clear();
        self.session.has_unsaved_changes = false;
        self.session.last_updated = Some(self.clock.now());
    }

    fn mark_dirty(&mut self) {
        self.session.has_unsaved_changes = true;
        self.session.last_updated = Some(self.clock.now());
    }

    fn emit(&self, change: MatchChange) {
        let _ = self.changes.send(change);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::{
        clock::ManualClock,
        events::{CardType, TeamSide},
    };

    pub(crate) fn fixture() -> Fixture {
        Fixture {
            id: "fx-1".into(),
            home: TeamIdentity::new(Some("1".into()), "A"),
            away: TeamIdentity::new(Some("2".into()), "B"),
        }
    }

    pub(crate) fn goal_input(team_id: &str, match_time_seconds: u32, is_own_goal: bool) -> GoalInput {
        let (team_name, side) = if team_id == "1" {
            ("A", TeamSide::Home)
        } else {
            ("B", TeamSide::Away)
        };
        GoalInput {
            player_id: Some(format!("p-{team_id}")),
            player_name: format!("Striker {team_id}"),
            team_id: Some(team_id.into()),
            team_name: team_name.into(),
            side,
            match_time_seconds,
            is_own_goal,
            assisted_by: None,
        }
    }

    pub(crate) fn card_input(player_id: &str, card_type: CardType) -> CardInput {
        CardInput {
            player_id: player_id.into(),
            player_name: format!("Player {player_id}"),
            team_id: Some("1".into()),
            team_name: "A".into(),
            side: TeamSide::Home,
            card_type,
            match_time_seconds: 120,
        }
    }

    pub(crate) fn slot(player_id: &str) -> PlayerSlot {
        PlayerSlot {
            player_id: player_id.into(),
            player_name: format!("Player {player_id}"),
            team_id: Some("1".into()),
            team_name: "A".into(),
            side: TeamSide::Home,
        }
    }

    fn store() -> (MatchEventStore, Arc<ManualClock>) {
        let clock = ManualClock::new(0);
        let mut store = MatchEventStore::new(clock.clone());
        store.setup_match(fixture());
        (store, clock)
    }

    #[test]
    fn goals_own_goals_and_removal_follow_the_scenario() {
        let (mut store, _clock) = store();

        let first = store.add_goal(goal_input("1", 300, false)).unwrap();
        assert_eq!(store.session().score, Score { home: 1, away: 0 });

        store.add_goal(goal_input("2", 600, true)).unwrap();
        assert_eq!(store.session().score, Score { home: 2, away: 0 });

        store.remove_goal(first.id).unwrap();
        assert_eq!(store.session().score, Score { home: 1, away: 0 });
        assert_eq!(store.session().score, store.derived_score());
    }

    #[test]
    fn duplicate_goal_is_rejected_without_touching_state() {
        let (mut store, _clock) = store();
        let first = store.add_goal(goal_input("1", 300, false)).unwrap();
        let before = store.session().goals.len();

        let err = store.add_goal(goal_input("1", 300, false)).unwrap_err();
        assert_eq!(err, GoalRejection::Duplicate { existing: first.id });
        assert_eq!(store.session().goals.len(), before);
        assert_eq!(store.session().score, Score { home: 1, away: 0 });
    }

    #[test]
    fn assists_never_change_the_score() {
        let (mut store, _clock) = store();
        store.add_assist(goal_input("1", 300, false)).unwrap();
        store.add_assist(goal_input("2", 310, true)).unwrap();
        assert_eq!(store.session().score, Score::ZERO);

        let goal = store.add_goal(goal_input("1", 300, false)).unwrap();
        assert_eq!(store.session().score, Score { home: 1, away: 0 });
        store.remove_goal(goal.id);
        assert_eq!(store.session().score, Score::ZERO);
    }

    #[test]
    fn score_never_goes_negative() {
        let (mut store, _clock) = store();
        let goal = store.add_goal(goal_input("1", 300, false)).unwrap();

        store.session.score = Score::ZERO;
        store.remove_goal(goal.id);
        assert_eq!(store.session().score, Score::ZERO);
        assert!(store.remove_goal(goal.id).is_none());
    }

    #[test]
    fn incremental_score_tracks_derivation() {
        let (mut store, _clock) = store();
        let mut ids = Vec::new();
        for minute in 0..12u32 {
            let team = if minute % 3 == 0 { "2" } else { "1" };
            let goal = store
                .add_goal(goal_input(team, minute * 60, minute % 4 == 0))
                .unwrap();
            ids.push(goal.id);
            assert_eq!(store.session().score, store.derived_score());
        }
        for id in ids.into_iter().rev().step_by(2) {
            store.remove_goal(id);
            assert_eq!(store.session().score, store.derived_score());
        }
    }

    #[test]
    fn updating_a_synced_goal_marks_it_dirty() {
        let (mut store, _clock) = store();
        let goal = store.add_goal(goal_input("1", 300, false)).unwrap();
        assert!(store.mark_goal_synced(goal.id, goal.revision));
        assert_eq!(store.unsaved_items_count().goals, 0);

        let updated = store
            .update_goal(
                goal.id,
                GoalPatch {
                    match_time_seconds: Some(310),
                    ..GoalPatch::default()
                },
            )
            .unwrap();
        assert!(!updated.synced);
        assert_eq!(updated.match_time_seconds, 310);
        assert_eq!(store.unsaved_items_count().goals, 1);
    }

    #[test]
    fn update_that_flips_own_goal_recomputes_score() {
        let (mut store, _clock) = store();
        let goal = store.add_goal(goal_input("1", 300, false)).unwrap();
        store.update_goal(
            goal.id,
            GoalPatch {
                is_own_goal: Some(true),
                ..GoalPatch::default()
            },
        );
        assert_eq!(store.session().score, Score { home: 0, away: 1 });
    }

    #[test]
    fn cards_are_not_deduplicated() {
        let (mut store, _clock) = store();
        let first = store.add_card(card_input("9", CardType::Yellow));
        let second = store.add_card(card_input("9", CardType::Yellow));
        assert_ne!(first.id, second.id);
        assert_eq!(store.session().cards.len(), 2);
        assert_eq!(store.session().score, Score::ZERO);

        let updated = store
            .update_card(
                second.id,
                CardPatch {
                    card_type: Some(CardType::Red),
                    ..CardPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.card_type, CardType::Red);
        assert!(store.remove_card(first.id).is_some());
        assert_eq!(store.unsaved_items_count().removals, 1);
    }

    #[test]
    fn player_time_scenario_through_the_store() {
        let (mut store, clock) = store();
        assert_eq!(store.start_player_time(slot("7")), PlayerTimeOutcome::Started);

        clock.set(300_000);
        assert_eq!(store.update_all_player_times(), vec!["7".to_string()]);
        let segment = store.session().player_times.get("7").unwrap();
        assert_eq!(segment.total_time, 300);
        assert_eq!(segment.start_time, Some(300_000));
        assert!(segment.periods.is_empty());

        clock.set(420_000);
        assert_eq!(
            store.stop_player_time("7"),
            PlayerTimeOutcome::Stopped { elapsed: 120 }
        );
        let segment = store.session().player_times.get("7").unwrap();
        assert_eq!(segment.total_time, 420);
        assert_eq!(segment.periods.len(), 1);
        assert_eq!(segment.periods[0].duration, 120);
    }

    #[test]
    fn stop_then_start_preserves_total() {
        let (mut store, clock) = store();
        store.start_player_time(slot("7"));
        clock.advance(Duration::from_secs(90));
        store.stop_player_time("7");
        let id = store.session().player_times.get("7").unwrap().id;

        assert_eq!(store.start_player_time(slot("7")), PlayerTimeOutcome::Resumed);
        let segment = store.session().player_times.get("7").unwrap();
        assert_eq!(segment.id, id);
        assert_eq!(segment.total_time, 90);
    }

    #[test]
    fn timeline_entries_mark_the_session_dirty_only() {
        let (mut store, _clock) = store();
        store.add_event("kick_off", "First half started", 0);
        assert!(store.session().has_unsaved_changes);
        assert!(store.unsaved_items_count().is_empty());
        assert_eq!(store.session().score, Score::ZERO);
    }

    #[test]
    fn reset_clears_collections_but_keeps_fixture() {
        let (mut store, _clock) = store();
        store.add_goal(goal_input("1", 300, false)).unwrap();
        store.add_card(card_input("9", CardType::Red));
        store.start_player_time(slot("7"));

        store.reset_state();
        let session = store.session();
        assert_eq!(session.score, Score::ZERO);
        assert!(session.goals.is_empty());
        assert!(session.cards.is_empty());
        assert!(session.player_times.is_empty());
        assert!(!session.has_unsaved_changes);
        assert!(session.fixture.is_some());

        store.reset_match();
        assert!(store.session().fixture.is_none());
    }

    #[test]
    fn re_attaching_the_same_fixture_keeps_events() {
        let (mut store, _clock) = store();
        store.add_goal(goal_input("1", 300, false)).unwrap();
        store.setup_match(fixture());
        assert_eq!(store.session().goals.len(), 1);

        let mut other = fixture();
        other.id = "fx-2".into();
        store.setup_match(other);
        assert!(store.session().goals.is_empty());
        assert_eq!(store.session().score, Score::ZERO);
    }

    #[test]
    fn edits_during_a_sync_stay_dirty() {
        let (mut store, _clock) = store();
        let goal = store.add_goal(goal_input("1", 300, false)).unwrap();
        let snapshot = store.dirty_snapshot(SyncScope::All).unwrap();

        store.update_goal(
            goal.id,
            GoalPatch {
                player_name: Some("Renamed".into()),
                ..GoalPatch::default()
            },
        );

        let pushed = &snapshot.goals[0];
        assert!(!store.mark_goal_synced(pushed.id, pushed.revision));
        assert_eq!(store.unsaved_items_count().goals, 1);
        assert!(!store.clear_unsaved_if_clean());
    }

    #[test]
    fn mutations_are_published() {
        let (mut store, _clock) = store();
        let mut changes = store.subscribe();
        let goal = store.add_goal(goal_input("1", 300, false)).unwrap();

        assert_eq!(changes.try_recv().unwrap(), MatchChange::GoalRecorded(goal));
        assert_eq!(
            changes.try_recv().unwrap(),
            MatchChange::ScoreChanged(Score { home: 1, away: 0 })
        );
    }

    #[test]
    fn undo_reverses_the_score_and_leaves_a_tombstone() {
        let (mut store, _clock) = store();
        let goal = store.add_goal(goal_input("2", 300, false)).unwrap();
        assert_eq!(store.session().score, Score { home: 0, away: 1 });

        let undone = store.undo_goal(goal.id).unwrap();
        assert_eq!(undone.id, goal.id);
        assert_eq!(store.session().score, Score::ZERO);
        assert_eq!(store.unsaved_items_count().removals, 1);
        assert!(store.undo_goal(goal.id).is_none());
    }

    #[test]
    fn detached_store_has_no_snapshot() {
        let store = MatchEventStore::new(ManualClock::new(0));
        assert!(store.dirty_snapshot(SyncScope::All).is_none());
    }
}
