use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod matches;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(matches::router());

    api_router.merge(docs::router()).with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::AppConfig, dao::fixture_store::memory::InMemoryFixtureStore, state::AppState,
    };

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: &Router<()>, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn goal_body(match_time_seconds: u32) -> Value {
        json!({
            "player_id": "9",
            "player_name": "Nine",
            "team_id": "1",
            "team_name": "A",
            "side": "home",
            "match_time_seconds": match_time_seconds
        })
    }

    #[tokio::test]
    async fn referee_flow_over_http() {
        let state = AppState::new(AppConfig::default());
        let backend = InMemoryFixtureStore::new();
        state.set_fixture_store(Arc::new(backend.clone())).await;
        let app = router(state);

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/match",
                json!({"fixture_id": "fx-1", "home": {"id": "1", "name": "A"}, "away": {"id": "2", "name": "B"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, goal) = send(&app, json_request("POST", "/match/goals", goal_body(300))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, json_request("POST", "/match/goals", goal_body(300))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            json_request("POST", "/match/players/ghost/stop", Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let missing = format!("/match/goals/{}", uuid::Uuid::nil());
        let (status, _) = send(&app, json_request("DELETE", &missing, Value::Null)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, saved) = send(&app, json_request("POST", "/match/save", Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["status"], "completed");
        assert_eq!(saved["has_unsaved_changes"], false);
        assert_eq!(backend.goals().await[0].id.to_string(), goal["id"]);

        let (_, snapshot) = send(
            &app,
            Request::builder().uri("/match").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(snapshot["home_score"], 1);
        assert_eq!(snapshot["goals"][0]["synced"], true);
    }

    #[tokio::test]
    async fn invalid_payloads_and_unconfirmed_resets_are_bad_requests() {
        let app = router(AppState::new(AppConfig::default()));

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/match",
                json!({"fixture_id": "  ", "home": {"name": "A"}, "away": {"name": "B"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("validation"));

        let (status, _) = send(&app, json_request("DELETE", "/match", json!({"confirm": false}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, health) = send(
            &app,
            Request::builder().uri("/healthcheck").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "degraded");
    }
}
