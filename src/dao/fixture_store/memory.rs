//! Process-local [`FixtureStore`] used when no database is configured and in tests.

use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::{
    fixture_store::FixtureStore,
    models::{CardEntity, FixtureScoreEntity, GoalEntity, PlayerTimeEntity, TimelineEntity},
    storage::{StorageError, StorageResult},
};

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    /// `upsert_goal` calls.
    pub goal_upserts: usize,
    /// `delete_goal` calls.
    pub goal_deletes: usize,
    /// `upsert_card` calls.
    pub card_upserts: usize,
    /// `delete_card` calls.
    pub card_deletes: usize,
    /// `upsert_player_time` calls.
    pub player_time_upserts: usize,
    /// `append_timeline_event` calls.
    pub timeline_appends: usize,
    /// `read_fixture_score` calls.
    pub score_reads: usize,
    /// `write_fixture_score` calls.
    pub score_writes: usize,
}

#[derive(Default)]
struct MemoryData {
    goals: IndexMap<Uuid, GoalEntity>,
    cards: IndexMap<Uuid, CardEntity>,
    player_times: IndexMap<Uuid, PlayerTimeEntity>,
    timeline: IndexMap<Uuid, TimelineEntity>,
    scores: HashMap<String, FixtureScoreEntity>,
    rejected_ids: HashSet<Uuid>,
    calls: StoreCalls,
}

/// In-memory backend with an availability switch.
#[derive(Clone, Default)]
pub struct InMemoryFixtureStore {
    data: Arc<Mutex<MemoryData>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryFixtureStore {
    /// Empty, available store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StorageError::Unavailable`] (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Refuse writes for the entity with the given id.
    pub async fn reject_id(&self, id: Uuid) {
        self.data.lock().await.rejected_ids.insert(id);
    }

    /// Accept writes for every entity again.
    pub async fn accept_all(&self) {
        self.data.lock().await.rejected_ids.clear();
    }

    /// Overwrite the stored score counters, bypassing the call counters.
    pub async fn set_fixture_score(&self, fixture_id: &str, score: FixtureScoreEntity) {
        self.data
            .lock()
            .await
            .scores
            .insert(fixture_id.to_owned(), score);
    }

    pub async fn fixture_score(&self, fixture_id: &str) -> Option<FixtureScoreEntity> {
        self.data.lock().await.scores.get(fixture_id).copied()
    }

    pub async fn goals(&self) -> Vec<GoalEntity> {
        self.data.lock().await.goals.values().cloned().collect()
    }

    pub async fn cards(&self) -> Vec<CardEntity> {
        self.data.lock().await.cards.values().cloned().collect()
    }

    pub async fn player_times(&self) -> Vec<PlayerTimeEntity> {
        self.data.lock().await.player_times.values().cloned().collect()
    }

    pub async fn timeline(&self) -> Vec<TimelineEntity> {
        self.data.lock().await.timeline.values().cloned().collect()
    }

    pub async fn calls(&self) -> StoreCalls {
        self.data.lock().await.calls
    }

    /// Run `op` against the data unless the store is offline or `id` is rejected.
    fn with_data<T, F>(&self, id: Option<Uuid>, op: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut MemoryData) -> T + Send + 'static,
    {
        let data = self.data.clone();
        let offline = self.offline.clone();
        Box::pin(async move {
            if offline.load(Ordering::SeqCst) {
                return Err(StorageError::unavailable(
                    "in-memory store is offline".into(),
                    io::Error::new(io::ErrorKind::NotConnected, "offline"),
                ));
            }
            let mut guard = data.lock().await;
            if let Some(id) = id.filter(|id| guard.rejected_ids.contains(id)) {
                return Err(StorageError::rejected(format!("entity `{id}` refused")));
            }
            Ok(op(&mut guard))
        })
    }
}

impl FixtureStore for InMemoryFixtureStore {
    fn upsert_goal(&self, goal: GoalEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.with_data(Some(goal.id), move |data| {
            data.calls.goal_upserts += 1;
            data.goals.insert(goal.id, goal);
        })
    }

    fn delete_goal(&self, _fixture_id: String, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.with_data(Some(id), move |data| {
            data.calls.goal_deletes += 1;
            data.goals.shift_remove(&id);
        })
    }

    fn upsert_card(&self, card: CardEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.with_data(Some(card.id), move |data| {
            data.calls.card_upserts += 1;
            data.cards.insert(card.id, card);
        })
    }

    fn delete_card(&self, _fixture_id: String, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.with_data(Some(id), move |data| {
            data.calls.card_deletes += 1;
            data.cards.shift_remove(&id);
        })
    }

    fn upsert_player_time(
        &self,
        record: PlayerTimeEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.with_data(Some(record.id), move |data| {
            data.calls.player_time_upserts += 1;
            data.player_times.insert(record.id, record);
        })
    }

    fn append_timeline_event(
        &self,
        event: TimelineEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.with_data(Some(event.id), move |data| {
            data.calls.timeline_appends += 1;
            data.timeline.insert(event.id, event);
        })
    }

    fn read_fixture_score(
        &self,
        fixture_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<FixtureScoreEntity>>> {
        self.with_data(None, move |data| {
            data.calls.score_reads += 1;
            data.scores.get(&fixture_id).copied()
        })
    }

    fn write_fixture_score(
        &self,
        fixture_id: String,
        score: FixtureScoreEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.with_data(None, move |data| {
            data.calls.score_writes += 1;
            data.scores.insert(fixture_id, score);
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.with_data(None, |_| ())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(id: Uuid) -> TimelineEntity {
        TimelineEntity {
            id,
            fixture_id: "fx-1".into(),
            kind: "kick_off".into(),
            description: "Kick-off".into(),
            match_time_seconds: 0,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = InMemoryFixtureStore::new();
        store.set_available(false);

        let err = store.health_check().await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        assert!(store.read_fixture_score("fx-1".into()).await.is_err());

        store.set_available(true);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn rejected_id_only_affects_that_entity() {
        let store = InMemoryFixtureStore::new();
        let refused = Uuid::now_v7();
        store.reject_id(refused).await;

        let err = store.append_timeline_event(timeline(refused)).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));
        store.append_timeline_event(timeline(Uuid::now_v7())).await.unwrap();

        assert_eq!(store.timeline().await.len(), 1);
        assert_eq!(store.calls().await.timeline_appends, 1);
    }

    #[tokio::test]
    async fn appending_the_same_timeline_entry_twice_keeps_one() {
        let store = InMemoryFixtureStore::new();
        let id = Uuid::now_v7();
        store.append_timeline_event(timeline(id)).await.unwrap();
        store.append_timeline_event(timeline(id)).await.unwrap();

        assert_eq!(store.timeline().await.len(), 1);
    }
}
