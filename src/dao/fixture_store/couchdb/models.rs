use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::dao::models::FixtureScoreEntity;

pub const GOAL_PREFIX: &str = "goal::";
pub const CARD_PREFIX: &str = "card::";
pub const PLAYER_TIME_PREFIX: &str = "playertime::";
pub const TIMELINE_PREFIX: &str = "timeline::";
pub const FIXTURE_PREFIX: &str = "fixture::";

const HOME_SCORE: &str = "home_score";
const AWAY_SCORE: &str = "away_score";

/// Event document: CouchDB metadata plus the flattened entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchEventDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Document family (`goal`, `card`, ...), handy for views.
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(flatten)]
    pub body: T,
}

/// Just enough of a document to update or delete it.
#[derive(Debug, Deserialize)]
pub struct CouchRevision {
    #[serde(rename = "_rev")]
    pub rev: String,
}

/// Fixture document. Only the score counters are owned here; other fields are kept as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchFixtureDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CouchFixtureDocument {
    pub fn new(fixture_id: &str) -> Self {
        Self {
            id: fixture_doc_id(fixture_id),
            rev: None,
            fields: Map::new(),
        }
    }

    /// Score counters stored on the fixture, if both are present and numeric.
    pub fn score(&self) -> Option<FixtureScoreEntity> {
        let read = |key: &str| {
            self.fields
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|value| u32::try_from(value).ok())
        };
        Some(FixtureScoreEntity {
            home_score: read(HOME_SCORE)?,
            away_score: read(AWAY_SCORE)?,
        })
    }

    pub fn set_score(&mut self, score: FixtureScoreEntity) {
        self.fields
            .insert(HOME_SCORE.to_string(), Value::from(score.home_score));
        self.fields
            .insert(AWAY_SCORE.to_string(), Value::from(score.away_score));
    }
}

pub fn event_doc_id(prefix: &str, fixture_id: &str, id: Uuid) -> String {
    format!("{}{}:{}", prefix, fixture_id, id)
}

pub fn fixture_doc_id(fixture_id: &str) -> String {
    format!("{}{}", FIXTURE_PREFIX, fixture_id)
}

/// `goal::` becomes `goal`.
pub fn doc_type(prefix: &str) -> String {
    prefix.trim_end_matches(':').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_ids_are_scoped_by_fixture() {
        let id = Uuid::nil();
        assert_eq!(
            event_doc_id(GOAL_PREFIX, "fx-1", id),
            "goal::fx-1:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(doc_type(PLAYER_TIME_PREFIX), "playertime");
    }

    #[test]
    fn score_update_keeps_unrelated_fixture_fields() {
        let mut doc: CouchFixtureDocument = serde_json::from_value(json!({
            "_id": "fixture::fx-1",
            "_rev": "3-abc",
            "home_team": "A",
            "home_score": 4,
        }))
        .unwrap();
        assert_eq!(doc.score(), None);

        doc.set_score(FixtureScoreEntity {
            home_score: 1,
            away_score: 0,
        });
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["home_team"], "A");
        assert_eq!(value["home_score"], 1);
        assert_eq!(value["_rev"], "3-abc");
    }
}
