use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::matches::{
        CardSummary, GoalSummary, IssueCardRequest, MatchSnapshot, PlayerTimeResponse,
        RecordGoalRequest, RefreshPlayersResponse, ResetMatchRequest, SetupMatchRequest,
        StartPlayerRequest, SyncResponse, TimelineRequest, TimelineSummary, UpdateCardRequest,
        UpdateGoalRequest,
    },
    error::AppError,
    services::{match_service, sync_service},
    state::{SharedState, events::UnsavedItems},
};

/// Referee endpoints for the match being officiated.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/match",
            get(get_match).post(setup_match).delete(reset_match),
        )
        .route("/match/goals", post(record_goal))
        .route("/match/assists", post(record_assist))
        .route("/match/goals/{id}", patch(update_goal).delete(remove_goal))
        .route("/match/goals/{id}/undo", post(undo_goal))
        .route("/match/cards", post(issue_card))
        .route("/match/cards/{id}", patch(update_card).delete(remove_card))
        .route("/match/players/start", post(start_player))
        .route("/match/players/refresh", post(refresh_players))
        .route("/match/players/{player_id}/stop", post(stop_player))
        .route("/match/players/{player_id}/toggle", post(toggle_player))
        .route("/match/timeline", post(add_timeline_event))
        .route("/match/unsaved", get(unsaved_items))
        .route("/match/save", post(save_match))
        .route("/match/finish", post(finish_match))
}

/// Current state of the match, including running player times.
#[utoipa::path(
    get,
    path = "/match",
    tag = "match",
    responses((status = 200, description = "Match snapshot", body = MatchSnapshot))
)]
pub async fn get_match(State(state): State<SharedState>) -> Json<MatchSnapshot> {
    Json(match_service::snapshot(&state).await)
}

/// Attach the session to a fixture.
#[utoipa::path(
    post,
    path = "/match",
    tag = "match",
    request_body = SetupMatchRequest,
    responses(
        (status = 200, description = "Match set up", body = MatchSnapshot),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Another fixture still has unsaved changes")
    )
)]
pub async fn setup_match(
    State(state): State<SharedState>,
    Json(payload): Json<SetupMatchRequest>,
) -> Result<Json<MatchSnapshot>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::setup_match(&state, payload).await?))
}

/// Discard every recorded event.
#[utoipa::path(
    delete,
    path = "/match",
    tag = "match",
    request_body = ResetMatchRequest,
    responses(
        (status = 200, description = "Match reset", body = MatchSnapshot),
        (status = 400, description = "Confirmation missing")
    )
)]
pub async fn reset_match(
    State(state): State<SharedState>,
    Json(payload): Json<ResetMatchRequest>,
) -> Result<Json<MatchSnapshot>, AppError> {
    Ok(Json(match_service::reset_match(&state, payload).await?))
}

/// Record a goal.
#[utoipa::path(
    post,
    path = "/match/goals",
    tag = "goals",
    request_body = RecordGoalRequest,
    responses(
        (status = 200, description = "Goal recorded", body = GoalSummary),
        (status = 409, description = "Duplicate goal or no match set up")
    )
)]
pub async fn record_goal(
    State(state): State<SharedState>,
    Json(payload): Json<RecordGoalRequest>,
) -> Result<Json<GoalSummary>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::record_goal(&state, payload).await?))
}

/// Record an assist; assists never change the score.
#[utoipa::path(
    post,
    path = "/match/assists",
    tag = "goals",
    request_body = RecordGoalRequest,
    responses(
        (status = 200, description = "Assist recorded", body = GoalSummary),
        (status = 409, description = "Duplicate assist or no match set up")
    )
)]
pub async fn record_assist(
    State(state): State<SharedState>,
    Json(payload): Json<RecordGoalRequest>,
) -> Result<Json<GoalSummary>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::record_assist(&state, payload).await?))
}

#[utoipa::path(
    patch,
    path = "/match/goals/{id}",
    tag = "goals",
    params(("id" = Uuid, Path, description = "Goal identifier")),
    request_body = UpdateGoalRequest,
    responses(
        (status = 200, description = "Goal updated", body = GoalSummary),
        (status = 404, description = "Unknown goal")
    )
)]
pub async fn update_goal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateGoalRequest>,
) -> Result<Json<GoalSummary>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::update_goal(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/match/goals/{id}",
    tag = "goals",
    params(("id" = Uuid, Path, description = "Goal identifier")),
    responses(
        (status = 200, description = "Goal removed", body = GoalSummary),
        (status = 404, description = "Unknown goal")
    )
)]
pub async fn remove_goal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GoalSummary>, AppError> {
    Ok(Json(match_service::remove_goal(&state, id).await?))
}

/// Undo a goal recorded by mistake.
#[utoipa::path(
    post,
    path = "/match/goals/{id}/undo",
    tag = "goals",
    params(("id" = Uuid, Path, description = "Goal identifier")),
    responses(
        (status = 200, description = "Goal undone", body = GoalSummary),
        (status = 404, description = "Unknown goal")
    )
)]
pub async fn undo_goal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GoalSummary>, AppError> {
    Ok(Json(match_service::undo_goal(&state, id).await?))
}

/// Issue a card.
#[utoipa::path(
    post,
    path = "/match/cards",
    tag = "cards",
    request_body = IssueCardRequest,
    responses((status = 200, description = "Card issued", body = CardSummary))
)]
pub async fn issue_card(
    State(state): State<SharedState>,
    Json(payload): Json<IssueCardRequest>,
) -> Result<Json<CardSummary>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::issue_card(&state, payload).await?))
}

#[utoipa::path(
    patch,
    path = "/match/cards/{id}",
    tag = "cards",
    params(("id" = Uuid, Path, description = "Card identifier")),
    request_body = UpdateCardRequest,
    responses(
        (status = 200, description = "Card updated", body = CardSummary),
        (status = 404, description = "Unknown card")
    )
)]
pub async fn update_card(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCardRequest>,
) -> Result<Json<CardSummary>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::update_card(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/match/cards/{id}",
    tag = "cards",
    params(("id" = Uuid, Path, description = "Card identifier")),
    responses(
        (status = 200, description = "Card removed", body = CardSummary),
        (status = 404, description = "Unknown card")
    )
)]
pub async fn remove_card(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CardSummary>, AppError> {
    Ok(Json(match_service::remove_card(&state, id).await?))
}

/// Put a player on the field.
#[utoipa::path(
    post,
    path = "/match/players/start",
    tag = "players",
    request_body = StartPlayerRequest,
    responses((status = 200, description = "Outcome of the request", body = PlayerTimeResponse))
)]
pub async fn start_player(
    State(state): State<SharedState>,
    Json(payload): Json<StartPlayerRequest>,
) -> Result<Json<PlayerTimeResponse>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::start_player(&state, payload).await?))
}

/// Take a player off the field.
#[utoipa::path(
    post,
    path = "/match/players/{player_id}/stop",
    tag = "players",
    params(("player_id" = String, Path, description = "Player identifier")),
    responses((status = 200, description = "Outcome of the request", body = PlayerTimeResponse))
)]
pub async fn stop_player(
    State(state): State<SharedState>,
    Path(player_id): Path<String>,
) -> Result<Json<PlayerTimeResponse>, AppError> {
    Ok(Json(match_service::stop_player(&state, &player_id).await?))
}

#[utoipa::path(
    post,
    path = "/match/players/{player_id}/toggle",
    tag = "players",
    params(("player_id" = String, Path, description = "Player identifier")),
    responses((status = 200, description = "Outcome of the request", body = PlayerTimeResponse))
)]
pub async fn toggle_player(
    State(state): State<SharedState>,
    Path(player_id): Path<String>,
) -> Result<Json<PlayerTimeResponse>, AppError> {
    Ok(Json(match_service::toggle_player(&state, &player_id).await?))
}

/// Fold running intervals into totals without stopping anyone.
#[utoipa::path(
    post,
    path = "/match/players/refresh",
    tag = "players",
    responses((status = 200, description = "Players refreshed", body = RefreshPlayersResponse))
)]
pub async fn refresh_players(State(state): State<SharedState>) -> Json<RefreshPlayersResponse> {
    Json(match_service::refresh_players(&state).await)
}

#[utoipa::path(
    post,
    path = "/match/timeline",
    tag = "match",
    request_body = TimelineRequest,
    responses((status = 200, description = "Timeline entry appended", body = TimelineSummary))
)]
pub async fn add_timeline_event(
    State(state): State<SharedState>,
    Json(payload): Json<TimelineRequest>,
) -> Result<Json<TimelineSummary>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::add_timeline_event(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/match/unsaved",
    tag = "sync",
    responses((status = 200, description = "Entities not yet persisted", body = UnsavedItems))
)]
pub async fn unsaved_items(State(state): State<SharedState>) -> Json<UnsavedItems> {
    Json(match_service::unsaved_items(&state).await)
}

/// Persist every pending change now, waiting for a running cycle first.
#[utoipa::path(
    post,
    path = "/match/save",
    tag = "sync",
    responses(
        (status = 200, description = "Save attempted", body = SyncResponse),
        (status = 503, description = "Save timed out")
    )
)]
pub async fn save_match(State(state): State<SharedState>) -> Result<Json<SyncResponse>, AppError> {
    Ok(Json(sync_service::save_now(&state).await?))
}

/// Stop every player on the field, then save.
#[utoipa::path(
    post,
    path = "/match/finish",
    tag = "sync",
    responses(
        (status = 200, description = "Match finished", body = SyncResponse),
        (status = 503, description = "Save timed out")
    )
)]
pub async fn finish_match(
    State(state): State<SharedState>,
) -> Result<Json<SyncResponse>, AppError> {
    Ok(Json(sync_service::finish_match(&state).await?))
}
