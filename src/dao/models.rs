use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{
    clock::Millis,
    events::{
        CardEvent, CardType, GoalEvent, GoalKind, Period, PlayerRef, PlayerTimeSegment, TeamSide,
        TimelineEvent,
    },
    score::Score,
};

/// Goal or assist as stored for a fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalEntity {
    /// Identifier generated when the goal was recorded.
    pub id: Uuid,
    /// Fixture the goal belongs to.
    pub fixture_id: String,
    pub player_id: Option<String>,
    pub player_name: String,
    pub team_id: Option<String>,
    pub team_name: String,
    pub side: TeamSide,
    /// `goal` or `assist`.
    pub kind: GoalKind,
    /// Match clock when the goal was scored, in seconds.
    pub match_time_seconds: u32,
    pub is_own_goal: bool,
    /// Player credited with the assist, if any.
    pub assisted_by: Option<AssistEntity>,
    /// Wall-clock creation time (Unix milliseconds).
    pub created_at: Millis,
}

/// Player credited with an assist on a stored goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistEntity {
    pub player_id: Option<String>,
    pub player_name: String,
}

/// Card as stored for a fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardEntity {
    pub id: Uuid,
    pub fixture_id: String,
    pub player_id: String,
    pub player_name: String,
    pub team_id: Option<String>,
    pub team_name: String,
    pub side: TeamSide,
    pub card_type: CardType,
    pub match_time_seconds: u32,
    pub created_at: Millis,
}

/// Accumulated playing time of a player as stored for a fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerTimeEntity {
    /// Identifier of the local segment.
    pub id: Uuid,
    pub fixture_id: String,
    pub player_id: String,
    pub player_name: String,
    pub team_id: Option<String>,
    pub team_name: String,
    pub side: TeamSide,
    /// Seconds played so far.
    pub total_time: u64,
    /// Whether the player was on the field when the record was written.
    pub is_playing: bool,
    /// Closed on-field intervals.
    pub periods: Vec<PeriodEntity>,
}

/// Closed on-field interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodEntity {
    pub start: Millis,
    pub end: Millis,
    /// Length in whole seconds.
    pub duration: u64,
}

/// Informational timeline entry as stored for a fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEntity {
    pub id: Uuid,
    pub fixture_id: String,
    pub kind: String,
    pub description: String,
    pub match_time_seconds: u32,
    pub created_at: Millis,
}

/// Redundant score counters kept on the fixture record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FixtureScoreEntity {
    pub home_score: u32,
    pub away_score: u32,
}

impl From<(&str, &GoalEvent)> for GoalEntity {
    fn from((fixture_id, goal): (&str, &GoalEvent)) -> Self {
        Self {
            id: goal.id,
            fixture_id: fixture_id.to_owned(),
            player_id: goal.player_id.clone(),
            player_name: goal.player_name.clone(),
            team_id: goal.team_id.clone(),
            team_name: goal.team_name.clone(),
            side: goal.side,
            kind: goal.kind,
            match_time_seconds: goal.match_time_seconds,
            is_own_goal: goal.is_own_goal,
            assisted_by: goal.assisted_by.as_ref().map(AssistEntity::from),
            created_at: goal.created_at,
        }
    }
}

impl From<&PlayerRef> for AssistEntity {
    fn from(value: &PlayerRef) -> Self {
        Self {
            player_id: value.player_id.clone(),
            player_name: value.player_name.clone(),
        }
    }
}

impl From<(&str, &CardEvent)> for CardEntity {
    fn from((fixture_id, card): (&str, &CardEvent)) -> Self {
        Self {
            id: card.id,
            fixture_id: fixture_id.to_owned(),
            player_id: card.player_id.clone(),
            player_name: card.player_name.clone(),
            team_id: card.team_id.clone(),
            team_name: card.team_name.clone(),
            side: card.side,
            card_type: card.card_type,
            match_time_seconds: card.match_time_seconds,
            created_at: card.created_at,
        }
    }
}

impl From<(&str, &PlayerTimeSegment)> for PlayerTimeEntity {
    fn from((fixture_id, segment): (&str, &PlayerTimeSegment)) -> Self {
        Self {
            id: segment.id,
            fixture_id: fixture_id.to_owned(),
            player_id: segment.player_id.clone(),
            player_name: segment.player_name.clone(),
            team_id: segment.team_id.clone(),
            team_name: segment.team_name.clone(),
            side: segment.side,
            total_time: segment.total_time,
            is_playing: segment.is_playing,
            periods: segment.periods.iter().map(PeriodEntity::from).collect(),
        }
    }
}

impl From<&Period> for PeriodEntity {
    fn from(value: &Period) -> Self {
        Self {
            start: value.start,
            end: value.end,
            duration: value.duration,
        }
    }
}

impl From<(&str, &TimelineEvent)> for TimelineEntity {
    fn from((fixture_id, event): (&str, &TimelineEvent)) -> Self {
        Self {
            id: event.id,
            fixture_id: fixture_id.to_owned(),
            kind: event.kind.clone(),
            description: event.description.clone(),
            match_time_seconds: event.match_time_seconds,
            created_at: event.created_at,
        }
    }
}

impl From<Score> for FixtureScoreEntity {
    fn from(value: Score) -> Self {
        Self {
            home_score: value.home,
            away_score: value.away,
        }
    }
}

impl From<FixtureScoreEntity> for Score {
    fn from(value: FixtureScoreEntity) -> Self {
        Score {
            home: value.home_score,
            away: value.away_score,
        }
    }
}
