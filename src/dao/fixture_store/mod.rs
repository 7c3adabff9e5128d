#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    CardEntity, FixtureScoreEntity, GoalEntity, PlayerTimeEntity, TimelineEntity,
};
use crate::dao::storage::StorageResult;

/// Remote persistence boundary receiving the match events of a fixture.
///
/// Every write is an idempotent upsert keyed by the event id so a sync cycle can be
/// retried wholesale after a partial failure.
pub trait FixtureStore: Send + Sync {
    fn upsert_goal(&self, goal: GoalEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a goal; deleting an unknown goal succeeds.
    fn delete_goal(&self, fixture_id: String, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn upsert_card(&self, card: CardEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a card; deleting an unknown card succeeds.
    fn delete_card(&self, fixture_id: String, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn upsert_player_time(
        &self,
        record: PlayerTimeEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn append_timeline_event(
        &self,
        event: TimelineEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Score counters currently stored on the fixture, `None` when never written.
    fn read_fixture_score(
        &self,
        fixture_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<FixtureScoreEntity>>>;
    fn write_fixture_score(
        &self,
        fixture_id: String,
        score: FixtureScoreEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
