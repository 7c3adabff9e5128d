use tracing::info;
use uuid::Uuid;

use crate::{
    dto::matches::{
        CardSummary, GoalSummary, IssueCardRequest, MatchSnapshot, PlayerTimeResponse,
        PlayerTimeSummary, RecordGoalRequest, RefreshPlayersResponse, ResetMatchRequest,
        SetupMatchRequest, StartPlayerRequest, TimelineRequest, TimelineSummary,
        UpdateCardRequest, UpdateGoalRequest,
    },
    error::ServiceError,
    state::{
        SharedState,
        events::{PlayerSlot, UnsavedItems},
        match_store::{Fixture, MatchEventStore},
        player_time::PlayerTimeOutcome,
    },
};

/// Everything the referee UI renders, as of now.
pub async fn snapshot(state: &SharedState) -> MatchSnapshot {
    let store = state.match_store().read().await;
    project(state, &store)
}

/// Attach the session to a fixture.
///
/// Switching to another fixture is refused while the current one still has unsaved changes.
pub async fn setup_match(
    state: &SharedState,
    request: SetupMatchRequest,
) -> Result<MatchSnapshot, ServiceError> {
    let fixture = Fixture::from(request);
    let mut store = state.match_store().write().await;

    let session = store.session();
    if let Some(current) = session.fixture.as_ref() {
        if current.id != fixture.id && session.has_unsaved_changes {
            return Err(ServiceError::Conflict(format!(
                "fixture `{}` still has unsaved changes; save or reset it first",
                current.id
            )));
        }
    }

    info!(fixture_id = %fixture.id, home = %fixture.home.name, away = %fixture.away.name, "match set up");
    store.setup_match(fixture);
    Ok(project(state, &store))
}

/// Clear the session; requires an explicit confirmation.
pub async fn reset_match(
    state: &SharedState,
    request: ResetMatchRequest,
) -> Result<MatchSnapshot, ServiceError> {
    if !request.confirm {
        return Err(ServiceError::InvalidInput(
            "resetting the match discards every event; send `confirm: true`".into(),
        ));
    }

    let mut store = state.match_store().write().await;
    let discarded = store.unsaved_items_count();
    if request.clear_fixture {
        store.reset_match();
    } else {
        store.reset_state();
    }
    info!(clear_fixture = request.clear_fixture, ?discarded, "match reset");
    Ok(project(state, &store))
}

pub async fn record_goal(
    state: &SharedState,
    request: RecordGoalRequest,
) -> Result<GoalSummary, ServiceError> {
    let mut store = state.match_store().write().await;
    ensure_attached(&store)?;
    Ok(store.add_goal(request.into())?.into())
}

pub async fn record_assist(
    state: &SharedState,
    request: RecordGoalRequest,
) -> Result<GoalSummary, ServiceError> {
    let mut store = state.match_store().write().await;
    ensure_attached(&store)?;
    Ok(store.add_assist(request.into())?.into())
}

pub async fn update_goal(
    state: &SharedState,
    id: Uuid,
    request: UpdateGoalRequest,
) -> Result<GoalSummary, ServiceError> {
    let mut store = state.match_store().write().await;
    store
        .update_goal(id, request.into())
        .map(Into::into)
        .ok_or_else(|| goal_not_found(id))
}

pub async fn remove_goal(state: &SharedState, id: Uuid) -> Result<GoalSummary, ServiceError> {
    let mut store = state.match_store().write().await;
    store
        .remove_goal(id)
        .map(Into::into)
        .ok_or_else(|| goal_not_found(id))
}

/// Take back the goal recorded by mistake; the score is reversed the same way as a removal.
pub async fn undo_goal(state: &SharedState, id: Uuid) -> Result<GoalSummary, ServiceError> {
    let mut store = state.match_store().write().await;
    store
        .undo_goal(id)
        .map(Into::into)
        .ok_or_else(|| goal_not_found(id))
}

pub async fn issue_card(
    state: &SharedState,
    request: IssueCardRequest,
) -> Result<CardSummary, ServiceError> {
    let mut store = state.match_store().write().await;
    ensure_attached(&store)?;
    Ok(store.add_card(request.into()).into())
}

pub async fn update_card(
    state: &SharedState,
    id: Uuid,
    request: UpdateCardRequest,
) -> Result<CardSummary, ServiceError> {
    let mut store = state.match_store().write().await;
    store
        .update_card(id, request.into())
        .map(Into::into)
        .ok_or_else(|| card_not_found(id))
}

pub async fn remove_card(state: &SharedState, id: Uuid) -> Result<CardSummary, ServiceError> {
    let mut store = state.match_store().write().await;
    store
        .remove_card(id)
        .map(Into::into)
        .ok_or_else(|| card_not_found(id))
}

/// Put a player on the field; starting a player already playing is reported, not rejected.
pub async fn start_player(
    state: &SharedState,
    request: StartPlayerRequest,
) -> Result<PlayerTimeResponse, ServiceError> {
    let slot = PlayerSlot::from(request);
    let player_id = slot.player_id.clone();
    let mut store = state.match_store().write().await;
    ensure_attached(&store)?;
    let outcome = store.start_player_time(slot);
    Ok(player_time_response(state, &store, &player_id, outcome))
}

pub async fn stop_player(
    state: &SharedState,
    player_id: &str,
) -> Result<PlayerTimeResponse, ServiceError> {
    let mut store = state.match_store().write().await;
    let outcome = store.stop_player_time(player_id);
    Ok(player_time_response(state, &store, player_id, outcome))
}

pub async fn toggle_player(
    state: &SharedState,
    player_id: &str,
) -> Result<PlayerTimeResponse, ServiceError> {
    let mut store = state.match_store().write().await;
    let outcome = store.toggle_player_time(player_id);
    Ok(player_time_response(state, &store, player_id, outcome))
}

/// Fold the running intervals of every player on the field into their totals.
pub async fn refresh_players(state: &SharedState) -> RefreshPlayersResponse {
    let refreshed = state.match_store().write().await.update_all_player_times();
    RefreshPlayersResponse { refreshed }
}

pub async fn add_timeline_event(
    state: &SharedState,
    request: TimelineRequest,
) -> Result<TimelineSummary, ServiceError> {
    let mut store = state.match_store().write().await;
    ensure_attached(&store)?;
    let event = store.add_event(
        request.kind.trim(),
        request.description,
        request.match_time_seconds,
    );
    Ok(event.into())
}

pub async fn unsaved_items(state: &SharedState) -> UnsavedItems {
    state.match_store().read().await.unsaved_items_count()
}

fn project(state: &SharedState, store: &MatchEventStore) -> MatchSnapshot {
    MatchSnapshot::at(
        store.session(),
        store.unsaved_items_count(),
        state.sync().is_syncing(),
        state.clock().now(),
    )
}

fn player_time_response(
    state: &SharedState,
    store: &MatchEventStore,
    player_id: &str,
    outcome: PlayerTimeOutcome,
) -> PlayerTimeResponse {
    let segment = store
        .session()
        .player_times
        .get(player_id)
        .map(|segment| PlayerTimeSummary::at(segment, state.clock().now()));
    PlayerTimeResponse::new(outcome, segment)
}

fn ensure_attached(store: &MatchEventStore) -> Result<(), ServiceError> {
    if store.session().fixture.is_none() {
        return Err(ServiceError::InvalidState(
            "no match has been set up".into(),
        ));
    }
    Ok(())
}

fn goal_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("goal `{id}` not found"))
}

fn card_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("card `{id}` not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::matches::TeamInput,
        state::{AppState, events::TeamSide},
    };

    fn setup_request(fixture_id: &str) -> SetupMatchRequest {
        SetupMatchRequest {
            fixture_id: fixture_id.into(),
            home: TeamInput {
                id: Some("1".into()),
                name: "A".into(),
            },
            away: TeamInput {
                id: Some("2".into()),
                name: "B".into(),
            },
        }
    }

    fn goal_request(match_time_seconds: u32) -> RecordGoalRequest {
        RecordGoalRequest {
            player_id: Some("p-9".into()),
            player_name: "Nine".into(),
            team_id: Some("1".into()),
            team_name: "A".into(),
            side: TeamSide::Home,
            match_time_seconds,
            is_own_goal: false,
            assisted_by: None,
        }
    }

    #[tokio::test]
    async fn goals_require_an_attached_fixture() {
        let state = AppState::new(AppConfig::default());

        let err = record_goal(&state, goal_request(60)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        setup_match(&state, setup_request("fx-1")).await.unwrap();
        let goal = record_goal(&state, goal_request(60)).await.unwrap();
        assert_eq!(goal.match_time_seconds, 60);
        assert_eq!(snapshot(&state).await.home_score, 1);
    }

    #[tokio::test]
    async fn duplicate_goal_is_a_conflict_and_unknown_ids_are_not_found() {
        let state = AppState::new(AppConfig::default());
        setup_match(&state, setup_request("fx-1")).await.unwrap();
        record_goal(&state, goal_request(60)).await.unwrap();

        let duplicate = record_goal(&state, goal_request(60)).await.unwrap_err();
        assert!(matches!(duplicate, ServiceError::Conflict(_)));

        let missing = remove_goal(&state, Uuid::nil()).await.unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));
        let missing = remove_card(&state, Uuid::nil()).await.unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn switching_fixture_with_unsaved_changes_is_refused() {
        let state = AppState::new(AppConfig::default());
        setup_match(&state, setup_request("fx-1")).await.unwrap();
        record_goal(&state, goal_request(60)).await.unwrap();

        let err = setup_match(&state, setup_request("fx-2")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // Re-attaching the same fixture keeps its events.
        let snapshot = setup_match(&state, setup_request("fx-1")).await.unwrap();
        assert_eq!(snapshot.goals.len(), 1);
    }

    #[tokio::test]
    async fn reset_needs_confirmation() {
        let state = AppState::new(AppConfig::default());
        setup_match(&state, setup_request("fx-1")).await.unwrap();
        record_goal(&state, goal_request(60)).await.unwrap();

        let refused = reset_match(
            &state,
            ResetMatchRequest {
                confirm: false,
                clear_fixture: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(refused, ServiceError::InvalidInput(_)));

        let snapshot = reset_match(
            &state,
            ResetMatchRequest {
                confirm: true,
                clear_fixture: true,
            },
        )
        .await
        .unwrap();
        assert!(snapshot.goals.is_empty());
        assert!(snapshot.fixture.is_none());
    }

    #[tokio::test]
    async fn stopping_an_idle_player_reports_the_no_op() {
        let state = AppState::new(AppConfig::default());
        setup_match(&state, setup_request("fx-1")).await.unwrap();

        let response = stop_player(&state, "ghost").await.unwrap();
        assert!(!response.changed);
        assert!(response.segment.is_none());

        let started = start_player(
            &state,
            StartPlayerRequest {
                player_id: "7".into(),
                player_name: "Seven".into(),
                team_id: Some("1".into()),
                team_name: "A".into(),
                side: TeamSide::Home,
            },
        )
        .await
        .unwrap();
        assert!(started.changed);
        assert!(started.segment.is_some_and(|segment| segment.is_playing));
    }
}
