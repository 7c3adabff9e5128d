//! Runtime representation of the events recorded during a match.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::clock::Millis;

/// Which side of the fixture a team plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    /// Home team.
    Home,
    /// Away team.
    Away,
}

impl TeamSide {
    /// The other side of the fixture.
    pub fn opponent(self) -> Self {
        match self {
            TeamSide::Home => TeamSide::Away,
            TeamSide::Away => TeamSide::Home,
        }
    }
}

/// Distinguishes goals from assists inside the goal collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    /// Counts towards the score.
    Goal,
    /// Informational only, never changes the score.
    Assist,
}

/// Card colour issued by the referee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    /// Caution.
    Yellow,
    /// Sending off.
    Red,
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamSide::Home => f.write_str("home"),
            TeamSide::Away => f.write_str("away"),
        }
    }
}

/// Reference to a player credited with an assist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRef {
    /// Identifier of the player, when known.
    pub player_id: Option<String>,
    /// Display name of the player.
    pub player_name: String,
}

/// A goal or an assist recorded during the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalEvent {
    /// Locally generated identifier.
    pub id: Uuid,
    /// Scoring player; goals can be recorded before the player is known.
    pub player_id: Option<String>,
    /// Display name of the scoring player.
    pub player_name: String,
    /// Team the player belongs to.
    pub team_id: Option<String>,
    /// Display name of the player's team.
    pub team_name: String,
    /// Side the player's team plays on.
    pub side: TeamSide,
    /// Goal or assist.
    pub kind: GoalKind,
    /// Match clock when the event happened.
    pub match_time_seconds: u32,
    /// Wall-clock creation time.
    pub created_at: Millis,
    /// Own goals benefit the opposing team.
    pub is_own_goal: bool,
    /// Player who provided the assist, if recorded.
    pub assisted_by: Option<PlayerRef>,
    /// Whether the current revision has been persisted remotely.
    pub synced: bool,
    /// Bumped on every local mutation.
    pub revision: u32,
}

/// A yellow or red card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardEvent {
    /// Locally generated identifier.
    pub id: Uuid,
    /// Booked player.
    pub player_id: String,
    /// Display name of the booked player.
    pub player_name: String,
    /// Team the player belongs to.
    pub team_id: Option<String>,
    /// Display name of the player's team.
    pub team_name: String,
    /// Side the player's team plays on.
    pub side: TeamSide,
    /// Card colour.
    pub card_type: CardType,
    /// Match clock when the card was shown.
    pub match_time_seconds: u32,
    /// Wall-clock creation time.
    pub created_at: Millis,
    /// Whether the current revision has been persisted remotely.
    pub synced: bool,
    /// Bumped on every local mutation.
    pub revision: u32,
}

/// Closed on-field interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    /// When the interval opened.
    pub start: Millis,
    /// When the interval closed.
    pub end: Millis,
    /// Length of the interval in whole seconds.
    pub duration: u64,
}

/// Accumulated playing time of one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTimeSegment {
    /// Locally generated identifier, stable across stop/start cycles.
    pub id: Uuid,
    /// Player the segment belongs to.
    pub player_id: String,
    /// Display name of the player.
    pub player_name: String,
    /// Team the player belongs to.
    pub team_id: Option<String>,
    /// Display name of the player's team.
    pub team_name: String,
    /// Side the player's team plays on.
    pub side: TeamSide,
    /// Seconds already folded into the total.
    pub total_time: u64,
    /// Whether an interval is currently open.
    pub is_playing: bool,
    /// Start of the open interval.
    pub start_time: Option<Millis>,
    /// Closed intervals in chronological order.
    pub periods: Vec<Period>,
    /// Whether the current revision has been persisted remotely.
    pub synced: bool,
    /// Bumped on every local mutation.
    pub revision: u32,
}

impl PlayerTimeSegment {
    /// Seconds elapsed in the open interval, floored.
    pub fn running_elapsed(&self, now: Millis) -> u64 {
        match (self.is_playing, self.start_time) {
            (true, Some(start)) => now.saturating_sub(start) / 1_000,
            _ => 0,
        }
    }

    /// Minutes-played figure to show in the UI: folded total plus the open interval.
    pub fn displayed_total(&self, now: Millis) -> u64 {
        self.total_time + self.running_elapsed(now)
    }
}

/// Informational entry on the match timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    /// Locally generated identifier.
    pub id: Uuid,
    /// Free-form type tag (e.g. `kick_off`, `half_time`).
    pub kind: String,
    /// Human readable description.
    pub description: String,
    /// Match clock when the event happened.
    pub match_time_seconds: u32,
    /// Wall-clock creation time.
    pub created_at: Millis,
    /// Whether the entry has been appended remotely.
    pub synced: bool,
}

/// Data supplied when recording a goal or an assist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalInput {
    /// Scoring player, when known.
    pub player_id: Option<String>,
    /// Display name of the scoring player.
    pub player_name: String,
    /// Team the player belongs to.
    pub team_id: Option<String>,
    /// Display name of the player's team.
    pub team_name: String,
    /// Side the player's team plays on.
    pub side: TeamSide,
    /// Match clock.
    pub match_time_seconds: u32,
    /// Own goals benefit the opposing team.
    pub is_own_goal: bool,
    /// Player who provided the assist.
    pub assisted_by: Option<PlayerRef>,
}

/// Partial update applied to an existing goal.
///
/// `None` leaves a field unchanged; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalPatch {
    /// New scorer id.
    pub player_id: Option<Option<String>>,
    /// New scorer name.
    pub player_name: Option<String>,
    /// New team id.
    pub team_id: Option<Option<String>>,
    /// New team name.
    pub team_name: Option<String>,
    /// New side.
    pub side: Option<TeamSide>,
    /// New match clock.
    pub match_time_seconds: Option<u32>,
    /// New own-goal flag.
    pub is_own_goal: Option<bool>,
    /// New assist provider.
    pub assisted_by: Option<Option<PlayerRef>>,
}

impl GoalPatch {
    pub(crate) fn apply(self, goal: &mut GoalEvent) {
        if let Some(value) = self.player_id {
            goal.player_id = value;
        }
        if let Some(value) = self.player_name {
            goal.player_name = value;
        }
        if let Some(value) = self.team_id {
            goal.team_id = value;
        }
        if let Some(value) = self.team_name {
            goal.team_name = value;
        }
        if let Some(value) = self.side {
            goal.side = value;
        }
        if let Some(value) = self.match_time_seconds {
            goal.match_time_seconds = value;
        }
        if let Some(value) = self.is_own_goal {
            goal.is_own_goal = value;
        }
        if let Some(value) = self.assisted_by {
            goal.assisted_by = value;
        }
    }
}

/// Data supplied when issuing a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInput {
    /// Booked player.
    pub player_id: String,
    /// Display name of the booked player.
    pub player_name: String,
    /// Team the player belongs to.
    pub team_id: Option<String>,
    /// Display name of the player's team.
    pub team_name: String,
    /// Side the player's team plays on.
    pub side: TeamSide,
    /// Card colour.
    pub card_type: CardType,
    /// Match clock.
    pub match_time_seconds: u32,
}

/// Partial update applied to an existing card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardPatch {
    /// New booked player id.
    pub player_id: Option<String>,
    /// New booked player name.
    pub player_name: Option<String>,
    /// New team id.
    pub team_id: Option<Option<String>>,
    /// New team name.
    pub team_name: Option<String>,
    /// New side.
    pub side: Option<TeamSide>,
    /// New card colour.
    pub card_type: Option<CardType>,
    /// New match clock.
    pub match_time_seconds: Option<u32>,
}

impl CardPatch {
    pub(crate) fn apply(self, card: &mut CardEvent) {
        if let Some(value) = self.player_id {
            card.player_id = value;
        }
        if let Some(value) = self.player_name {
            card.player_name = value;
        }
        if let Some(value) = self.team_id {
            card.team_id = value;
        }
        if let Some(value) = self.team_name {
            card.team_name = value;
        }
        if let Some(value) = self.side {
            card.side = value;
        }
        if let Some(value) = self.card_type {
            card.card_type = value;
        }
        if let Some(value) = self.match_time_seconds {
            card.match_time_seconds = value;
        }
    }
}

/// Identity of a player whose time is being tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    /// Player id.
    pub player_id: String,
    /// Display name of the player.
    pub player_name: String,
    /// Team the player belongs to.
    pub team_id: Option<String>,
    /// Display name of the player's team.
    pub team_name: String,
    /// Side the player's team plays on.
    pub side: TeamSide,
}

/// Counts of entities that still need to reach the persistence boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct UnsavedItems {
    /// Unsynced goals and assists.
    pub goals: usize,
    /// Unsynced cards.
    pub cards: usize,
    /// Unsynced player-time segments.
    pub player_times: usize,
    /// Local removals not yet propagated.
    pub removals: usize,
}

impl UnsavedItems {
    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.goals == 0 && self.cards == 0 && self.player_times == 0 && self.removals == 0
    }
}
