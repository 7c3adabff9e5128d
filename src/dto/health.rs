use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether a sync cycle is running.
    pub syncing: bool,
    /// Whether local changes still need to reach storage.
    pub has_unsaved_changes: bool,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(syncing: bool, has_unsaved_changes: bool) -> Self {
        Self {
            status: "ok".to_string(),
            syncing,
            has_unsaved_changes,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(syncing: bool, has_unsaved_changes: bool) -> Self {
        Self {
            status: "degraded".to_string(),
            syncing,
            has_unsaved_changes,
        }
    }
}
