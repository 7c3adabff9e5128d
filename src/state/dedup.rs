//! Duplicate detection for goals and assists.

use crate::state::events::{GoalEvent, GoalInput, GoalKind};

/// Fields that make two goal entries the same real-world event.
#[derive(Debug, Clone, Copy)]
pub struct GoalFingerprint<'a> {
    /// Player id; compared when both sides carry one.
    pub player_id: Option<&'a str>,
    /// Player name, the fallback when an id is missing.
    pub player_name: &'a str,
    /// Team id.
    pub team_id: Option<&'a str>,
    /// Team name, the fallback when a team id is missing.
    pub team_name: &'a str,
    /// Goal or assist.
    pub kind: GoalKind,
    /// Match clock.
    pub match_time_seconds: u32,
    /// Own-goal flag.
    pub is_own_goal: bool,
}

impl<'a> GoalFingerprint<'a> {
    /// Fingerprint of a stored event.
    pub fn of_event(goal: &'a GoalEvent) -> Self {
        Self {
            player_id: goal.player_id.as_deref(),
            player_name: &goal.player_name,
            team_id: goal.team_id.as_deref(),
            team_name: &goal.team_name,
            kind: goal.kind,
            match_time_seconds: goal.match_time_seconds,
            is_own_goal: goal.is_own_goal,
        }
    }

    /// Fingerprint of an entry about to be inserted.
    pub fn of_input(input: &'a GoalInput, kind: GoalKind) -> Self {
        Self {
            player_id: input.player_id.as_deref(),
            player_name: &input.player_name,
            team_id: input.team_id.as_deref(),
            team_name: &input.team_name,
            kind,
            match_time_seconds: input.match_time_seconds,
            is_own_goal: input.is_own_goal,
        }
    }

    fn same_player(&self, other: &Self) -> bool {
        match (self.player_id, other.player_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.player_name == other.player_name,
        }
    }

    fn same_team(&self, other: &Self) -> bool {
        match (self.team_id, other.team_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.team_name == other.team_name,
        }
    }

    /// Whether both fingerprints describe the same event.
    pub fn collides_with(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.match_time_seconds == other.match_time_seconds
            && self.is_own_goal == other.is_own_goal
            && self.same_player(other)
            && self.same_team(other)
    }
}

/// Find the stored goal that `candidate` duplicates, if any.
pub fn find_duplicate<'a, I>(existing: I, candidate: &GoalFingerprint<'_>) -> Option<&'a GoalEvent>
where
    I: IntoIterator<Item = &'a GoalEvent>,
{
    existing
        .into_iter()
        .find(|goal| GoalFingerprint::of_event(goal).collides_with(candidate))
}

/// Whether `candidate` duplicates one of the `existing` goals.
pub fn is_duplicate<'a, I>(existing: I, candidate: &GoalFingerprint<'_>) -> bool
where
    I: IntoIterator<Item = &'a GoalEvent>,
{
    find_duplicate(existing, candidate).is_some()
}
