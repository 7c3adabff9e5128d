use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage connectivity along with the local sync state.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_fixture_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let syncing = state.sync().is_syncing();
    let has_unsaved_changes = state
        .match_store()
        .read()
        .await
        .session()
        .has_unsaved_changes;

    if state.is_degraded() {
        HealthResponse::degraded(syncing, has_unsaved_changes)
    } else {
        HealthResponse::ok(syncing, has_unsaved_changes)
    }
}
