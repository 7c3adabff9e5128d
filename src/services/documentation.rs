use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Touchline Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::match_stream,
        crate::routes::matches::get_match,
        crate::routes::matches::setup_match,
        crate::routes::matches::reset_match,
        crate::routes::matches::record_goal,
        crate::routes::matches::record_assist,
        crate::routes::matches::update_goal,
        crate::routes::matches::remove_goal,
        crate::routes::matches::undo_goal,
        crate::routes::matches::issue_card,
        crate::routes::matches::update_card,
        crate::routes::matches::remove_card,
        crate::routes::matches::start_player,
        crate::routes::matches::stop_player,
        crate::routes::matches::toggle_player,
        crate::routes::matches::refresh_players,
        crate::routes::matches::add_timeline_event,
        crate::routes::matches::unsaved_items,
        crate::routes::matches::save_match,
        crate::routes::matches::finish_match,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::SetupMatchRequest,
            crate::dto::matches::TeamInput,
            crate::dto::matches::ResetMatchRequest,
            crate::dto::matches::PlayerRefDto,
            crate::dto::matches::RecordGoalRequest,
            crate::dto::matches::UpdateGoalRequest,
            crate::dto::matches::IssueCardRequest,
            crate::dto::matches::UpdateCardRequest,
            crate::dto::matches::StartPlayerRequest,
            crate::dto::matches::TimelineRequest,
            crate::dto::matches::MatchSnapshot,
            crate::dto::matches::FixtureSummary,
            crate::dto::matches::TeamSummary,
            crate::dto::matches::GoalSummary,
            crate::dto::matches::CardSummary,
            crate::dto::matches::PeriodSummary,
            crate::dto::matches::PlayerTimeSummary,
            crate::dto::matches::TimelineSummary,
            crate::dto::matches::PlayerTimeResponse,
            crate::dto::matches::RefreshPlayersResponse,
            crate::dto::matches::SyncResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::ScoreChangedEvent,
            crate::dto::sse::RemovedEvent,
            crate::dto::sse::MatchSetUpEvent,
            crate::dto::sse::SyncStateEvent,
            crate::dto::sse::NoticeLevel,
            crate::dto::sse::SyncNotice,
            crate::services::sync_coordinator::SyncReport,
            crate::services::sync_coordinator::SyncFailure,
            crate::services::sync_coordinator::EntityKind,
            crate::services::sync_coordinator::ScoreReconciliation,
            crate::state::events::TeamSide,
            crate::state::events::GoalKind,
            crate::state::events::CardType,
            crate::state::events::UnsavedItems,
            crate::state::score::Score,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events stream"),
        (name = "match", description = "Fixture setup, snapshot and timeline"),
        (name = "goals", description = "Goals and assists"),
        (name = "cards", description = "Disciplinary cards"),
        (name = "players", description = "Player time tracking"),
        (name = "sync", description = "Persistence of local changes"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_match_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/match",
            "/match/goals/{id}",
            "/match/players/{player_id}/toggle",
            "/match/save",
            "/sse/match",
            "/healthcheck",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
