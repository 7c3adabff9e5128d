//! Standalone event buffer for contexts without a shared match store.
//!
//! It follows the same rules as [`crate::state::match_store::MatchEventStore`]
//! (deduplication, own goals, zero floor, player-time accounting, dirty
//! tracking) and queues every change in a FIFO that [`LocalBuffer::flush`]
//! hands over to whoever owns persistence.

use std::{collections::VecDeque, sync::Arc};

use tracing::warn;
use uuid::Uuid;

use crate::state::{
    clock::Clock,
    dedup::{GoalFingerprint, find_duplicate},
    events::{
        CardEvent, CardInput, CardPatch, GoalEvent, GoalInput, GoalKind, GoalPatch, PlayerSlot,
        PlayerTimeSegment, TimelineEvent, UnsavedItems,
    },
    ids::IdGenerator,
    match_store::GoalRejection,
    player_time::{PlayerTimeOutcome, PlayerTimeTracker},
    score::{Score, TeamIdentity, benefiting_side, derive_score},
};

/// Change waiting in the buffer queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferedEntry {
    /// Goal or assist recorded.
    Goal(GoalEvent),
    /// Latest state of an edited goal or assist.
    GoalUpdated(GoalEvent),
    /// Goal or assist removed.
    GoalRemoved(Uuid),
    /// Card issued.
    Card(CardEvent),
    /// Latest state of an edited card.
    CardUpdated(CardEvent),
    /// Card removed.
    CardRemoved(Uuid),
    /// Latest state of a player-time segment.
    PlayerTime(PlayerTimeSegment),
    /// Timeline entry appended.
    Timeline(TimelineEvent),
}

/// Isolated goal/card/player-time/timeline buffer.
pub struct LocalBuffer {
    home: TeamIdentity,
    away: TeamIdentity,
    score: Score,
    goals: Vec<GoalEvent>,
    cards: Vec<CardEvent>,
    player_times: PlayerTimeTracker,
    timeline: Vec<TimelineEvent>,
    queue: VecDeque<BufferedEntry>,
    has_unsaved_changes: bool,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
}

impl LocalBuffer {
    /// Create an empty buffer for a fixture between `home` and `away`.
    pub fn new(home: TeamIdentity, away: TeamIdentity, clock: Arc<dyn Clock>) -> Self {
        Self {
            home,
            away,
            score: Score::ZERO,
            goals: Vec::new(),
            cards: Vec::new(),
            player_times: PlayerTimeTracker::new(),
            timeline: Vec::new(),
            queue: VecDeque::new(),
            has_unsaved_changes: false,
            ids: IdGenerator::new(clock.clone()),
            clock,
        }
    }

    /// Current score.
    pub fn score(&self) -> Score {
        self.score
    }

    /// Recorded goals and assists.
    pub fn goals(&self) -> &[GoalEvent] {
        &self.goals
    }

    /// Issued cards.
    pub fn cards(&self) -> &[CardEvent] {
        &self.cards
    }

    /// Player-time segments.
    pub fn player_times(&self) -> &PlayerTimeTracker {
        &self.player_times
    }

    /// Timeline entries.
    pub fn timeline(&self) -> &[TimelineEvent] {
        &self.timeline
    }

    /// Whether anything changed since the last flush.
    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    /// Record a goal.
    pub fn add_goal(&mut self, input: GoalInput) -> Result<GoalEvent, GoalRejection> {
        self.insert_goal(input, GoalKind::Goal)
    }

    /// Record an assist.
    pub fn add_assist(&mut self, input: GoalInput) -> Result<GoalEvent, GoalRejection> {
        self.insert_goal(input, GoalKind::Assist)
    }

    fn insert_goal(&mut self, input: GoalInput, kind: GoalKind) -> Result<GoalEvent, GoalRejection> {
        let fingerprint = GoalFingerprint::of_input(&input, kind);
        if let Some(existing) = find_duplicate(&self.goals, &fingerprint) {
            warn!(existing = %existing.id, "duplicate goal rejected by local buffer");
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

        if let Some(side) = benefiting_side(&goal, &self.home, &self.away) {
            self.score.credit(side);
        }
        self.goals.push(goal.clone());
        self.enqueue(BufferedEntry::Goal(goal.clone()));
        Ok(goal)
    }

    /// Merge `patch` into a goal and recompute the score from the goal list.
    pub fn update_goal(&mut self, id: Uuid, patch: GoalPatch) -> Option<GoalEvent> {
        let Some(goal) = self.goals.iter_mut().find(|g| g.id == id) else {
            warn!(goal_id = %id, "goal not found in local buffer; update ignored");
            return None;
        };

        patch.apply(goal);
        goal.synced = false;
        goal.revision = goal.revision.wrapping_add(1);
        let updated = goal.clone();

        self.score = derive_score(&self.goals, &self.home, &self.away);
        self.enqueue(BufferedEntry::GoalUpdated(updated.clone()));
        Some(updated)
    }

    /// Remove a goal and reverse its contribution, never below zero.
    pub fn remove_goal(&mut self, id: Uuid) -> Option<GoalEvent> {
        let Some(index) = self.goals.iter().position(|g| g.id == id) else {
            warn!(goal_id = %id, "goal not found in local buffer");
            return None;
        };

        let goal = self.goals.remove(index);
        if let Some(side) = benefiting_side(&goal, &self.home, &self.away) {
            self.score.revoke(side);
        }
        self.enqueue(BufferedEntry::GoalRemoved(id));
        Some(goal)
    }

    /// Undo a goal; same as [`LocalBuffer::remove_goal`].
    pub fn undo_goal(&mut self, id: Uuid) -> Option<GoalEvent> {
        self.remove_goal(id)
    }

    /// Issue a card.
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
        self.cards.push(card.clone());
        self.enqueue(BufferedEntry::Card(card.clone()));
        card
    }

    /// Merge `patch` into a card.
    pub fn update_card(&mut self, id: Uuid, patch: CardPatch) -> Option<CardEvent> {
        let Some(card) = self.cards.iter_mut().find(|c| c.id == id) else {
            warn!(card_id = %id, "card not found in local buffer; update ignored");
            return None;
        };

        patch.apply(card);
        card.synced = false;
        card.revision = card.revision.wrapping_add(1);
        let updated = card.clone();

        self.enqueue(BufferedEntry::CardUpdated(updated.clone()));
        Some(updated)
    }

    /// Remove a card.
    pub fn remove_card(&mut self, id: Uuid) -> Option<CardEvent> {
        let Some(index) = self.cards.iter().position(|c| c.id == id) else {
            warn!(card_id = %id, "card not found in local buffer");
            return None;
        };
        let card = self.cards.remove(index);
        self.enqueue(BufferedEntry::CardRemoved(id));
        Some(card)
    }

    /// Put a player on the field.
    pub fn start_player_time(&mut self, slot: PlayerSlot) -> PlayerTimeOutcome {
        let player_id = slot.player_id.clone();
        let outcome = self.player_times.start(slot, self.clock.now(), &self.ids);
        self.queue_segment(&player_id, outcome);
        outcome
    }

    /// Take a player off the field.
    pub fn stop_player_time(&mut self, player_id: &str) -> PlayerTimeOutcome {
        let outcome = self.player_times.stop(player_id, self.clock.now());
        self.queue_segment(player_id, outcome);
        outcome
    }

    /// Start or stop a player depending on whether they are playing.
    pub fn toggle_player_time(&mut self, player_id: &str) -> PlayerTimeOutcome {
        let outcome = self.player_times.toggle(player_id, self.clock.now());
        self.queue_segment(player_id, outcome);
        outcome
    }

    /// Fold running intervals into totals without closing them.
    pub fn update_all_player_times(&mut self) -> Vec<String> {
        let refreshed = self.player_times.fold_running(self.clock.now());
        for player_id in &refreshed {
            if let Some(segment) = self.player_times.get(player_id) {
                let segment = segment.clone();
                self.enqueue(BufferedEntry::PlayerTime(segment));
            }
        }
        refreshed
    }

    /// Append a timeline entry.
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
        self.timeline.push(event.clone());
        self.enqueue(BufferedEntry::Timeline(event.clone()));
        event
    }

    /// Counts of entries not handed over yet.
    pub fn unsaved_items_count(&self) -> UnsavedItems {
        UnsavedItems {
            goals: self.goals.iter().filter(|g| !g.synced).count(),
            cards: self.cards.iter().filter(|c| !c.synced).count(),
            player_times: self.player_times.unsynced_count(),
            removals: self
                .queue
                .iter()
                .filter(|entry| {
                    matches!(
                        entry,
                        BufferedEntry::GoalRemoved(_) | BufferedEntry::CardRemoved(_)
                    )
                })
                .count(),
        }
    }

    /// Number of queued entries.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue in FIFO order and mark everything handed over as synced.
    pub fn flush(&mut self) -> Vec<BufferedEntry> {
        let entries = self.queue.drain(..).collect::<Vec<_>>();

        for entry in &entries {
            match entry {
                BufferedEntry::Goal(goal) | BufferedEntry::GoalUpdated(goal) => {
                    if let Some(stored) = self.goals.iter_mut().find(|g| g.id == goal.id) {
                        stored.synced = true;
                    }
                }
                BufferedEntry::Card(card) | BufferedEntry::CardUpdated(card) => {
                    if let Some(stored) = self.cards.iter_mut().find(|c| c.id == card.id) {
                        stored.synced = true;
                    }
                }
                BufferedEntry::PlayerTime(segment) => {
                    self.player_times
                        .mark_synced(&segment.player_id, segment.revision);
                }
                BufferedEntry::Timeline(event) => {
                    if let Some(stored) = self.timeline.iter_mut().find(|e| e.id == event.id) {
                        stored.synced = true;
                    }
                }
                BufferedEntry::GoalRemoved(_) | BufferedEntry::CardRemoved(_) => {}
            }
        }

        self.has_unsaved_changes = false;
        entries
    }

    /// Drop everything, including entries not flushed yet.
    pub fn reset(&mut self) {
        self.score = Score::ZERO;
        self.goals.clear();
        self.cards.clear();
        self.player_times.clear();
        self.timeline.clear();
        self.queue.clear();
        self.has_unsaved_changes = false;
    }

    fn queue_segment(&mut self, player_id: &str, outcome: PlayerTimeOutcome) {
        if !outcome.changed() {
            return;
        }
        if let Some(segment) = self.player_times.get(player_id) {
            let segment = segment.clone();
            self.enqueue(BufferedEntry::PlayerTime(segment));
        }
    }

    fn enqueue(&mut self, entry: BufferedEntry) {
        self.queue.push_back(entry);
        self.has_unsaved_changes = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        clock::ManualClock,
        events::CardType,
        match_store::{
            MatchEventStore,
            tests::{card_input, fixture, goal_input, slot},
        },
    };

    fn buffer() -> (LocalBuffer, Arc<ManualClock>) {
        let clock = ManualClock::new(0);
        let fixture = fixture();
        (LocalBuffer::new(fixture.home, fixture.away, clock.clone()), clock)
    }

    #[test]
    fn follows_the_same_score_rules_as_the_store() {
        let (mut buffer, _clock) = buffer();
        let first = buffer.add_goal(goal_input("1", 300, false)).unwrap();
        buffer.add_goal(goal_input("2", 600, true)).unwrap();
        assert_eq!(buffer.score(), Score { home: 2, away: 0 });

        assert!(buffer.add_goal(goal_input("2", 600, true)).is_err());
        buffer.add_assist(goal_input("1", 300, false)).unwrap();
        assert_eq!(buffer.score(), Score { home: 2, away: 0 });

        buffer.remove_goal(first.id);
        assert_eq!(buffer.score(), Score { home: 1, away: 0 });
    }

    #[test]
    fn removal_floors_at_zero() {
        let (mut buffer, _clock) = buffer();
        let goal = buffer.add_goal(goal_input("1", 300, false)).unwrap();
        buffer.score = Score::ZERO;
        buffer.remove_goal(goal.id);
        assert_eq!(buffer.score(), Score::ZERO);
    }

    #[test]
    fn flush_drains_in_order_and_clears_dirty_state() {
        let (mut buffer, clock) = buffer();
        let goal = buffer.add_goal(goal_input("1", 300, false)).unwrap();
        let card = buffer.add_card(card_input("9", CardType::Yellow));
        buffer.start_player_time(slot("7"));
        clock.set(60_000);
        buffer.stop_player_time("7");
        assert!(buffer.has_unsaved_changes());
        assert_eq!(buffer.pending(), 4);

        let entries = buffer.flush();
        assert_eq!(entries.len(), 4);
        assert!(matches!(&entries[0], BufferedEntry::Goal(g) if g.id == goal.id));
        assert!(matches!(&entries[1], BufferedEntry::Card(c) if c.id == card.id));
        assert!(matches!(&entries[3], BufferedEntry::PlayerTime(s) if s.total_time == 60));

        assert!(!buffer.has_unsaved_changes());
        assert!(buffer.unsaved_items_count().is_empty());
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn reset_drops_unflushed_entries() {
        let (mut buffer, _clock) = buffer();
        buffer.add_goal(goal_input("1", 300, false)).unwrap();
        buffer.start_player_time(slot("7"));

        buffer.reset();

        assert_eq!(buffer.pending(), 0);
        assert_eq!(buffer.score(), Score::ZERO);
        assert!(buffer.goals().is_empty());
        assert!(buffer.player_times().is_empty());
        assert!(!buffer.has_unsaved_changes());
    }

    #[test]
    fn flushed_entries_can_be_absorbed_by_a_store() {
        let clock = ManualClock::new(0);
        let mut store = MatchEventStore::new(clock.clone());
        store.setup_match(fixture());
        let already = store.add_goal(goal_input("1", 300, false)).unwrap();

        let fixture = fixture();
        let mut buffer = LocalBuffer::new(fixture.home, fixture.away, clock.clone());
        buffer.add_goal(goal_input("1", 300, false)).unwrap();
        buffer.add_goal(goal_input("2", 900, false)).unwrap();
        buffer.add_event("half_time", "Half time", 1_500);

        let report = store.absorb(buffer.flush());
        assert_eq!(report.applied, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(store.session().score, Score { home: 1, away: 1 });
        assert!(store.session().goals.contains_key(&already.id));
        assert_eq!(store.session().timeline.len(), 1);
    }

    #[test]
    fn absorbing_a_later_spell_adds_to_the_stored_segment() {
        let clock = ManualClock::new(0);
        let mut store = MatchEventStore::new(clock.clone());
        store.setup_match(fixture());
        store.start_player_time(slot("7"));
        clock.set(600_000);
        store.stop_player_time("7");
        let stored_id = store.session().player_times.get("7").unwrap().id;

        let fixture = fixture();
        let mut buffer = LocalBuffer::new(fixture.home, fixture.away, clock.clone());
        buffer.start_player_time(slot("7"));
        clock.set(660_000);
        buffer.stop_player_time("7");

        let report = store.absorb(buffer.flush());
        assert_eq!(report.applied, 2);

        let segment = store.session().player_times.get("7").unwrap();
        assert_eq!(segment.id, stored_id);
        assert_eq!(segment.total_time, 660);
        assert_eq!(segment.periods.len(), 2);
        assert!(!segment.is_playing);
        assert!(!segment.synced);
        assert!(store.session().has_unsaved_changes);
    }

    #[test]
    fn editing_a_flushed_goal_marks_it_unsaved_and_rescores() {
        let (mut buffer, _clock) = buffer();
        let goal = buffer.add_goal(goal_input("1", 300, false)).unwrap();
        let first_flush = buffer.flush();
        assert!(buffer.goals()[0].synced);
        assert_eq!(buffer.score(), Score { home: 1, away: 0 });

        let updated = buffer
            .update_goal(
                goal.id,
                GoalPatch {
                    is_own_goal: Some(true),
                    ..GoalPatch::default()
                },
            )
            .unwrap();
        assert!(!updated.synced);
        assert_eq!(updated.revision, goal.revision + 1);
        assert_eq!(buffer.score(), Score { home: 0, away: 1 });
        assert_eq!(buffer.unsaved_items_count().goals, 1);
        assert!(buffer.has_unsaved_changes());

        let clock = ManualClock::new(0);
        let mut store = MatchEventStore::new(clock);
        store.setup_match(fixture());
        store.absorb(first_flush);
        assert_eq!(store.session().score, Score { home: 1, away: 0 });

        let second_flush = buffer.flush();
        assert!(matches!(&second_flush[..], [BufferedEntry::GoalUpdated(g)] if g.is_own_goal));
        let report = store.absorb(second_flush.clone());
        assert_eq!(report.applied, 1);
        assert_eq!(store.session().score, Score { home: 0, away: 1 });
        assert!(store.session().goals[&goal.id].is_own_goal);
        assert!(!store.session().goals[&goal.id].synced);

        assert_eq!(store.absorb(second_flush).rejected, 1);
    }

    #[test]
    fn card_edits_and_undo_follow_the_store_contract() {
        let (mut buffer, _clock) = buffer();
        let card = buffer.add_card(card_input("9", CardType::Yellow));
        let goal = buffer.add_goal(goal_input("2", 400, false)).unwrap();
        buffer.flush();

        let updated = buffer
            .update_card(
                card.id,
                CardPatch {
                    card_type: Some(CardType::Red),
                    ..CardPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.card_type, CardType::Red);
        assert!(!updated.synced);
        assert_eq!(buffer.unsaved_items_count().cards, 1);

        assert_eq!(buffer.undo_goal(goal.id).map(|g| g.id), Some(goal.id));
        assert_eq!(buffer.score(), Score::ZERO);
        assert!(buffer.remove_card(Uuid::nil()).is_none());
        assert!(buffer.update_goal(goal.id, GoalPatch::default()).is_none());
    }

    #[test]
    fn absorbing_the_same_flush_twice_changes_nothing() {
        let clock = ManualClock::new(0);
        let mut store = MatchEventStore::new(clock.clone());
        store.setup_match(fixture());

        let fixture = fixture();
        let mut buffer = LocalBuffer::new(fixture.home, fixture.away, clock.clone());
        let card = buffer.add_card(card_input("9", CardType::Yellow));
        buffer.add_goal(goal_input("1", 300, false)).unwrap();
        buffer.add_event("half_time", "Half time", 2_700);
        buffer.start_player_time(slot("7"));
        clock.set(90_000);
        buffer.stop_player_time("7");
        let entries = buffer.flush();

        let first = store.absorb(entries.clone());
        assert_eq!((first.applied, first.rejected), (5, 0));
        store
            .update_card(
                card.id,
                CardPatch {
                    card_type: Some(CardType::Red),
                    ..CardPatch::default()
                },
            )
            .unwrap();

        let second = store.absorb(entries.clone());
        assert_eq!((second.applied, second.rejected), (0, entries.len()));
        assert_eq!(store.session().cards.len(), 1);
        assert_eq!(store.session().cards[&card.id].card_type, CardType::Red);
        assert_eq!(store.session().timeline.len(), 1);
        assert_eq!(store.session().score, Score { home: 1, away: 0 });
        let segment = store.session().player_times.get("7").unwrap();
        assert_eq!(segment.total_time, 90);
        assert_eq!(segment.periods.len(), 1);
    }
}
