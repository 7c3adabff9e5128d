use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    fixture_store::FixtureStore,
    models::{CardEntity, FixtureScoreEntity, GoalEntity, PlayerTimeEntity, TimelineEntity},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        CARD_PREFIX, CouchEventDocument, CouchFixtureDocument, CouchRevision, GOAL_PREFIX,
        PLAYER_TIME_PREFIX, TIMELINE_PREFIX, doc_type, event_doc_id, fixture_doc_id,
    },
};

/// [`FixtureStore`] writing one CouchDB document per event.
#[derive(Clone)]
pub struct CouchFixtureStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchFixtureStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.with_auth(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .with_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .with_auth(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412: created concurrently by another instance.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    /// Write `body` under `doc_id`, reusing the current revision when the document exists.
    async fn upsert_event<T>(&self, prefix: &str, doc_id: String, body: T) -> CouchResult<()>
    where
        T: Serialize,
    {
        let rev = self
            .get_document::<CouchRevision>(&doc_id)
            .await?
            .map(|existing| existing.rev);
        let doc = CouchEventDocument {
            id: doc_id.clone(),
            rev,
            doc_type: doc_type(prefix),
            body,
        };
        self.put_document(&doc_id, &doc).await
    }

    /// Delete `doc_id`; a document that is already gone counts as deleted.
    async fn delete_document(&self, doc_id: &str) -> CouchResult<()> {
        let Some(CouchRevision { rev }) = self.get_document::<CouchRevision>(doc_id).await? else {
            debug!(doc_id, "document already absent; nothing to delete");
            return Ok(());
        };

        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }
}

impl FixtureStore for CouchFixtureStore {
    fn upsert_goal(&self, goal: GoalEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = event_doc_id(GOAL_PREFIX, &goal.fixture_id, goal.id);
            store
                .upsert_event(GOAL_PREFIX, doc_id, goal)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_goal(&self, fixture_id: String, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = event_doc_id(GOAL_PREFIX, &fixture_id, id);
            store.delete_document(&doc_id).await.map_err(Into::into)
        })
    }

    fn upsert_card(&self, card: CardEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = event_doc_id(CARD_PREFIX, &card.fixture_id, card.id);
            store
                .upsert_event(CARD_PREFIX, doc_id, card)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_card(&self, fixture_id: String, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = event_doc_id(CARD_PREFIX, &fixture_id, id);
            store.delete_document(&doc_id).await.map_err(Into::into)
        })
    }

    fn upsert_player_time(
        &self,
        record: PlayerTimeEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = event_doc_id(PLAYER_TIME_PREFIX, &record.fixture_id, record.id);
            store
                .upsert_event(PLAYER_TIME_PREFIX, doc_id, record)
                .await
                .map_err(Into::into)
        })
    }

    fn append_timeline_event(
        &self,
        event: TimelineEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = event_doc_id(TIMELINE_PREFIX, &event.fixture_id, event.id);
            store
                .upsert_event(TIMELINE_PREFIX, doc_id, event)
                .await
                .map_err(Into::into)
        })
    }

    fn read_fixture_score(
        &self,
        fixture_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<FixtureScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<CouchFixtureDocument>(&fixture_doc_id(&fixture_id))
                .await?;
            Ok(doc.and_then(|doc| doc.score()))
        })
    }

    fn write_fixture_score(
        &self,
        fixture_id: String,
        score: FixtureScoreEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = fixture_doc_id(&fixture_id);
            let mut doc = store
                .get_document::<CouchFixtureDocument>(&doc_id)
                .await?
                .unwrap_or_else(|| CouchFixtureDocument::new(&fixture_id));
            doc.set_score(score);
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .with_auth(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
