//! DTO definitions used by the match REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::validation::validate_not_blank,
    services::sync_coordinator::{SyncOutcome, SyncReport},
    state::{
        clock::{Millis, format_millis},
        events::{
            CardEvent, CardInput, CardPatch, CardType, GoalEvent, GoalInput, GoalKind, GoalPatch,
            PlayerRef, PlayerSlot, PlayerTimeSegment, TeamSide, TimelineEvent, UnsavedItems,
        },
        match_store::{Fixture, MatchSession},
        player_time::PlayerTimeOutcome,
        score::TeamIdentity,
    },
};

/// Longest match clock accepted, in seconds (extra time and stoppages included).
const MAX_MATCH_TIME_SECONDS: u32 = 4 * 60 * 60;

/// Team identity supplied at setup time.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamInput {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
}

/// Payload attaching the service to a fixture.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetupMatchRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub fixture_id: String,
    #[validate(nested)]
    pub home: TeamInput,
    #[validate(nested)]
    pub away: TeamInput,
}

/// Confirmation required before wiping the match.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetMatchRequest {
    pub confirm: bool,
    /// Also detach the fixture.
    #[serde(default)]
    pub clear_fixture: bool,
}

/// Player credited with an assist.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct PlayerRefDto {
    #[serde(default)]
    pub player_id: Option<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub player_name: String,
}

/// Payload recording a goal or an assist.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RecordGoalRequest {
    #[serde(default)]
    pub player_id: Option<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub player_name: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub team_name: String,
    pub side: TeamSide,
    #[validate(range(max = MAX_MATCH_TIME_SECONDS))]
    pub match_time_seconds: u32,
    #[serde(default)]
    pub is_own_goal: bool,
    #[serde(default)]
    #[validate(nested)]
    pub assisted_by: Option<PlayerRefDto>,
}

/// Partial update of a goal. Omitted fields are kept; `null` clears optional ones.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateGoalRequest {
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub player_id: Option<Option<String>>,
    #[validate(custom(function = "validate_not_blank"))]
    pub player_name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub team_id: Option<Option<String>>,
    #[validate(custom(function = "validate_not_blank"))]
    pub team_name: Option<String>,
    pub side: Option<TeamSide>,
    #[validate(range(max = MAX_MATCH_TIME_SECONDS))]
    pub match_time_seconds: Option<u32>,
    pub is_own_goal: Option<bool>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<PlayerRefDto>)]
    pub assisted_by: Option<Option<PlayerRefDto>>,
}

/// Payload issuing a card.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct IssueCardRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub player_name: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub team_name: String,
    pub side: TeamSide,
    pub card_type: CardType,
    #[validate(range(max = MAX_MATCH_TIME_SECONDS))]
    pub match_time_seconds: u32,
}

/// Partial update of a card.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateCardRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: Option<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub player_name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub team_id: Option<Option<String>>,
    #[validate(custom(function = "validate_not_blank"))]
    pub team_name: Option<String>,
    pub side: Option<TeamSide>,
    pub card_type: Option<CardType>,
    #[validate(range(max = MAX_MATCH_TIME_SECONDS))]
    pub match_time_seconds: Option<u32>,
}

/// Player stepping onto the field.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartPlayerRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub player_name: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub team_name: String,
    pub side: TeamSide,
}

/// Informational timeline entry.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TimelineRequest {
    /// Free-form type tag, e.g. `kick_off`.
    #[validate(custom(function = "validate_not_blank"))]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(max = MAX_MATCH_TIME_SECONDS))]
    pub match_time_seconds: u32,
}

/// Fixture the match is attached to.
#[derive(Debug, Serialize, ToSchema)]
pub struct FixtureSummary {
    pub id: String,
    pub home: TeamSummary,
    pub away: TeamSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamSummary {
    pub id: Option<String>,
    pub name: String,
}

/// Goal or assist as shown to the referee.
#[derive(Debug, Serialize, ToSchema)]
pub struct GoalSummary {
    pub id: Uuid,
    pub player_id: Option<String>,
    pub player_name: String,
    pub team_id: Option<String>,
    pub team_name: String,
    pub side: TeamSide,
    pub kind: GoalKind,
    pub match_time_seconds: u32,
    pub is_own_goal: bool,
    pub assisted_by: Option<PlayerRefDto>,
    /// RFC 3339 creation time.
    pub created_at: String,
    pub synced: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CardSummary {
    pub id: Uuid,
    pub player_id: String,
    pub player_name: String,
    pub team_id: Option<String>,
    pub team_name: String,
    pub side: TeamSide,
    pub card_type: CardType,
    pub match_time_seconds: u32,
    pub created_at: String,
    pub synced: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PeriodSummary {
    pub start: String,
    pub end: String,
    pub duration: u64,
}

/// Playing time of one player; `displayed_total` includes the running interval.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerTimeSummary {
    pub id: Uuid,
    pub player_id: String,
    pub player_name: String,
    pub team_id: Option<String>,
    pub team_name: String,
    pub side: TeamSide,
    pub total_time: u64,
    pub displayed_total: u64,
    pub is_playing: bool,
    pub start_time: Option<String>,
    pub periods: Vec<PeriodSummary>,
    pub synced: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimelineSummary {
    pub id: Uuid,
    pub kind: String,
    pub description: String,
    pub match_time_seconds: u32,
    pub created_at: String,
    pub synced: bool,
}

/// Everything the referee UI renders.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchSnapshot {
    pub fixture: Option<FixtureSummary>,
    pub home_score: u32,
    pub away_score: u32,
    pub goals: Vec<GoalSummary>,
    pub cards: Vec<CardSummary>,
    pub player_times: Vec<PlayerTimeSummary>,
    pub timeline: Vec<TimelineSummary>,
    pub has_unsaved_changes: bool,
    pub unsaved_items: UnsavedItems,
    /// Whether a sync cycle is running.
    pub syncing: bool,
    pub last_updated: Option<String>,
}

/// Result of a player-time operation; no-ops are reported, not rejected.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerTimeResponse {
    /// `started`, `resumed`, `already_playing`, `stopped`, `not_playing` or `unknown_player`.
    pub outcome: String,
    pub changed: bool,
    pub segment: Option<PlayerTimeSummary>,
}

/// Players whose running interval was folded.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshPlayersResponse {
    pub refreshed: Vec<String>,
}

/// Result of an explicit save.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    /// `completed`, `clean`, `degraded`, `detached`, `throttled` or `already_syncing`.
    pub status: String,
    pub report: Option<SyncReport>,
    pub has_unsaved_changes: bool,
    pub unsaved_items: UnsavedItems,
}

impl From<Fixture> for FixtureSummary {
    fn from(value: Fixture) -> Self {
        Self {
            id: value.id,
            home: value.home.into(),
            away: value.away.into(),
        }
    }
}

impl From<TeamIdentity> for TeamSummary {
    fn from(value: TeamIdentity) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<TeamInput> for TeamIdentity {
    fn from(value: TeamInput) -> Self {
        TeamIdentity::new(non_blank(value.id), value.name.trim())
    }
}

impl From<SetupMatchRequest> for Fixture {
    fn from(value: SetupMatchRequest) -> Self {
        Fixture {
            id: value.fixture_id.trim().to_string(),
            home: value.home.into(),
            away: value.away.into(),
        }
    }
}

impl From<PlayerRefDto> for PlayerRef {
    fn from(value: PlayerRefDto) -> Self {
        PlayerRef {
            player_id: non_blank(value.player_id),
            player_name: value.player_name,
        }
    }
}

impl From<PlayerRef> for PlayerRefDto {
    fn from(value: PlayerRef) -> Self {
        PlayerRefDto {
            player_id: value.player_id,
            player_name: value.player_name,
        }
    }
}

impl From<RecordGoalRequest> for GoalInput {
    fn from(value: RecordGoalRequest) -> Self {
        GoalInput {
            player_id: non_blank(value.player_id),
            player_name: value.player_name,
            team_id: non_blank(value.team_id),
            team_name: value.team_name,
            side: value.side,
            match_time_seconds: value.match_time_seconds,
            is_own_goal: value.is_own_goal,
            assisted_by: value.assisted_by.map(Into::into),
        }
    }
}

impl From<UpdateGoalRequest> for GoalPatch {
    fn from(value: UpdateGoalRequest) -> Self {
        GoalPatch {
            player_id: value.player_id.map(non_blank),
            player_name: value.player_name,
            team_id: value.team_id.map(non_blank),
            team_name: value.team_name,
            side: value.side,
            match_time_seconds: value.match_time_seconds,
            is_own_goal: value.is_own_goal,
            assisted_by: value.assisted_by.map(|inner| inner.map(Into::into)),
        }
    }
}

impl From<IssueCardRequest> for CardInput {
    fn from(value: IssueCardRequest) -> Self {
        CardInput {
            player_id: value.player_id,
            player_name: value.player_name,
            team_id: non_blank(value.team_id),
            team_name: value.team_name,
            side: value.side,
            card_type: value.card_type,
            match_time_seconds: value.match_time_seconds,
        }
    }
}

impl From<UpdateCardRequest> for CardPatch {
    fn from(value: UpdateCardRequest) -> Self {
        CardPatch {
            player_id: value.player_id,
            player_name: value.player_name,
            team_id: value.team_id.map(non_blank),
            team_name: value.team_name,
            side: value.side,
            card_type: value.card_type,
            match_time_seconds: value.match_time_seconds,
        }
    }
}

impl From<StartPlayerRequest> for PlayerSlot {
    fn from(value: StartPlayerRequest) -> Self {
        PlayerSlot {
            player_id: value.player_id,
            player_name: value.player_name,
            team_id: non_blank(value.team_id),
            team_name: value.team_name,
            side: value.side,
        }
    }
}

impl From<GoalEvent> for GoalSummary {
    fn from(goal: GoalEvent) -> Self {
        Self {
            id: goal.id,
            player_id: goal.player_id,
            player_name: goal.player_name,
            team_id: goal.team_id,
            team_name: goal.team_name,
            side: goal.side,
            kind: goal.kind,
            match_time_seconds: goal.match_time_seconds,
            is_own_goal: goal.is_own_goal,
            assisted_by: goal.assisted_by.map(Into::into),
            created_at: format_millis(goal.created_at),
            synced: goal.synced,
        }
    }
}

impl From<CardEvent> for CardSummary {
    fn from(card: CardEvent) -> Self {
        Self {
            id: card.id,
            player_id: card.player_id,
            player_name: card.player_name,
            team_id: card.team_id,
            team_name: card.team_name,
            side: card.side,
            card_type: card.card_type,
            match_time_seconds: card.match_time_seconds,
            created_at: format_millis(card.created_at),
            synced: card.synced,
        }
    }
}

impl From<TimelineEvent> for TimelineSummary {
    fn from(event: TimelineEvent) -> Self {
        Self {
            id: event.id,
            kind: event.kind,
            description: event.description,
            match_time_seconds: event.match_time_seconds,
            created_at: format_millis(event.created_at),
            synced: event.synced,
        }
    }
}

impl PlayerTimeSummary {
    /// Project a segment as seen at `now`.
    pub fn at(segment: &PlayerTimeSegment, now: Millis) -> Self {
        Self {
            id: segment.id,
            player_id: segment.player_id.clone(),
            player_name: segment.player_name.clone(),
            team_id: segment.team_id.clone(),
            team_name: segment.team_name.clone(),
            side: segment.side,
            total_time: segment.total_time,
            displayed_total: segment.displayed_total(now),
            is_playing: segment.is_playing,
            start_time: segment.start_time.map(format_millis),
            periods: segment
                .periods
                .iter()
                .map(|period| PeriodSummary {
                    start: format_millis(period.start),
                    end: format_millis(period.end),
                    duration: period.duration,
                })
                .collect(),
            synced: segment.synced,
        }
    }
}

impl MatchSnapshot {
    /// Project the session as seen at `now`.
    pub fn at(session: &MatchSession, unsaved_items: UnsavedItems, syncing: bool, now: Millis) -> Self {
        Self {
            fixture: session.fixture.clone().map(Into::into),
            home_score: session.score.home,
            away_score: session.score.away,
            goals: session.goals.values().cloned().map(Into::into).collect(),
            cards: session.cards.values().cloned().map(Into::into).collect(),
            player_times: session
                .player_times
                .iter()
                .map(|segment| PlayerTimeSummary::at(segment, now))
                .collect(),
            timeline: session.timeline.iter().cloned().map(Into::into).collect(),
            has_unsaved_changes: session.has_unsaved_changes,
            unsaved_items,
            syncing,
            last_updated: session.last_updated.map(format_millis),
        }
    }
}

impl PlayerTimeResponse {
    pub fn new(outcome: PlayerTimeOutcome, segment: Option<PlayerTimeSummary>) -> Self {
        Self {
            outcome: outcome.to_string(),
            changed: outcome.changed(),
            segment,
        }
    }
}

/// Machine-readable status of a sync outcome.
pub fn sync_status(outcome: &SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::AlreadySyncing => "already_syncing",
        SyncOutcome::Throttled { .. } => "throttled",
        SyncOutcome::Degraded => "degraded",
        SyncOutcome::Detached => "detached",
        SyncOutcome::Clean => "clean",
        SyncOutcome::Completed(_) => "completed",
    }
}

/// Treat empty identifiers as absent so identity matching falls back to names.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn goal_patch_distinguishes_null_from_missing() {
        let request: UpdateGoalRequest =
            serde_json::from_value(json!({"team_id": null, "match_time_seconds": 61})).unwrap();
        let patch: GoalPatch = request.into();

        assert_eq!(patch.team_id, Some(None));
        assert_eq!(patch.player_id, None);
        assert_eq!(patch.match_time_seconds, Some(61));
    }

    #[test]
    fn blank_names_and_out_of_range_times_are_rejected() {
        let request: RecordGoalRequest = serde_json::from_value(json!({
            "player_name": "  ",
            "team_name": "A",
            "side": "home",
            "match_time_seconds": 99_999,
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("player_name"));
        assert!(fields.contains_key("match_time_seconds"));
    }

    #[test]
    fn empty_team_id_is_treated_as_missing() {
        let request: RecordGoalRequest = serde_json::from_value(json!({
            "player_id": "",
            "player_name": "Nine",
            "team_id": " ",
            "team_name": "A",
            "side": "home",
            "match_time_seconds": 300,
        }))
        .unwrap();
        let input: GoalInput = request.into();

        assert_eq!(input.player_id, None);
        assert_eq!(input.team_id, None);
    }
}
