use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/match",
    tag = "sse",
    responses((status = 200, description = "Match event stream", content_type = "text/event-stream", body = String))
)]
/// Stream match changes, sync notices and storage status to the referee UI.
pub async fn match_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = sse_service::subscribe(&state);
    info!("new match SSE connection");
    sse_service::to_sse_stream(sse_service::handshake(&state), receiver)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/match", get(match_stream))
}
