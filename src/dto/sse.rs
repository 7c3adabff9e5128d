use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{events::UnsavedItems, score::Score};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the cached score changes.
pub struct ScoreChangedEvent {
    pub home_score: u32,
    pub away_score: u32,
}

impl From<Score> for ScoreChangedEvent {
    fn from(value: Score) -> Self {
        Self {
            home_score: value.home,
            away_score: value.away,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when an entity was removed from the match.
pub struct RemovedEvent {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a fixture was attached.
pub struct MatchSetUpEvent {
    pub fixture_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after a sync cycle updated the dirty bookkeeping.
pub struct SyncStateEvent {
    pub has_unsaved_changes: bool,
    pub unsaved_items: UnsavedItems,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Severity of a transient notification.
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Serialize, ToSchema)]
/// Transient, user-facing notification about a sync cycle.
pub struct SyncNotice {
    pub level: NoticeLevel,
    pub message: String,
}
