use std::{collections::HashMap, sync::Arc};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc},
    options::{IndexOptions, ReadConcern, WriteConcern},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        GAME_COLLECTION_NAME, MongoGameDocument, MongoPlayerDocument, MongoProgressDocument,
        MongoQuestionDocument, PLAYER_COLLECTION_NAME, PROGRESS_COLLECTION_NAME,
        QUESTION_COLLECTION_NAME, doc_id, participant_filter, unfinished_filter, uuid_strings,
    },
    unit_of_work::MongoUnitOfWork,
};
use crate::dao::{
    models::{GameSessionEntity, GameStatus, PlayerEntity, PlayerProgressEntity, QuestionEntity},
    quiz_store::{GamePage, PlayerDirectory, QuestionBank, QuizStore, UnitOfWork, sample_ids},
    storage::StorageResult,
};

/// Quiz store backed by MongoDB. Cloning shares the underlying client.
#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let indexes: [(&'static str, &'static str, Document, bool); 5] = [
            (
                GAME_COLLECTION_NAME,
                "status_created_at",
                doc! {"status": 1, "created_at": 1},
                false,
            ),
            (
                GAME_COLLECTION_NAME,
                "first_player_id",
                doc! {"first_player_id": 1},
                false,
            ),
            (
                GAME_COLLECTION_NAME,
                "second_player_id",
                doc! {"second_player_id": 1},
                false,
            ),
            (
                PROGRESS_COLLECTION_NAME,
                "game_id,player_id",
                doc! {"game_id": 1, "player_id": 1},
                true,
            ),
            (
                QUESTION_COLLECTION_NAME,
                "published",
                doc! {"published": 1},
                false,
            ),
        ];

        for (collection, index, keys, unique) in indexes {
            let model = mongodb::IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{}_idx", index.replace(',', "_"))))
                        .unique(Some(unique))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn games(&self) -> Collection<MongoGameDocument> {
        self.database().await.collection(GAME_COLLECTION_NAME)
    }

    async fn progresses(&self) -> Collection<MongoProgressDocument> {
        self.database().await.collection(PROGRESS_COLLECTION_NAME)
    }

    async fn questions(&self) -> Collection<MongoQuestionDocument> {
        self.database().await.collection(QUESTION_COLLECTION_NAME)
    }

    async fn begin(&self) -> MongoResult<MongoUnitOfWork> {
        let (client, database) = {
            let guard = self.inner.state.read().await;
            (guard.client.clone(), guard.database.clone())
        };

        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::StartTransaction { source })?;
        session
            .start_transaction()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::majority())
            .await
            .map_err(|source| MongoDaoError::StartTransaction { source })?;

        Ok(MongoUnitOfWork::new(session, database))
    }

    async fn find_games(&self, filter: Document) -> MongoResult<Vec<GameSessionEntity>> {
        let documents: Vec<MongoGameDocument> = self
            .games()
            .await
            .find(filter)
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::LoadGames { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadGames { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_one_game(&self, filter: Document) -> MongoResult<Option<GameSessionEntity>> {
        self.games()
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::LoadGames { source })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn page_games(&self, player_id: Uuid, skip: u64, limit: u64) -> MongoResult<GamePage> {
        let collection = self.games().await;
        let total = collection
            .count_documents(participant_filter(player_id))
            .await
            .map_err(|source| MongoDaoError::LoadGames { source })?;

        let documents: Vec<MongoGameDocument> = collection
            .find(participant_filter(player_id))
            .sort(doc! {"created_at": -1})
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::LoadGames { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadGames { source })?;

        let items = documents
            .into_iter()
            .map(TryInto::try_into)
            .collect::<MongoResult<_>>()?;
        Ok(GamePage { items, total })
    }

    async fn find_progresses(&self, game_ids: &[Uuid]) -> MongoResult<Vec<PlayerProgressEntity>> {
        let documents: Vec<MongoProgressDocument> = self
            .progresses()
            .await
            .find(doc! {"game_id": {"$in": uuid_strings(game_ids)}})
            .await
            .map_err(|source| MongoDaoError::LoadProgresses { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadProgresses { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn published_random_set(&self, count: usize) -> MongoResult<Vec<QuestionEntity>> {
        let raw = self.database().await.collection::<Document>(QUESTION_COLLECTION_NAME);
        let candidates: Vec<Document> = raw
            .find(doc! {"published": true})
            .projection(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::LoadQuestions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadQuestions { source })?;

        let ids = candidates
            .iter()
            .filter_map(|document| document.get_str("_id").ok())
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect();
        let picked = sample_ids(ids, count);

        let mut by_id: HashMap<Uuid, QuestionEntity> = self
            .find_questions(&picked)
            .await?
            .into_iter()
            .map(|question| (question.id, question))
            .collect();

        // Keep the draw order; it becomes the game's question order.
        Ok(picked
            .iter()
            .filter_map(|id| by_id.remove(id))
            .filter(|question| question.published)
            .collect())
    }

    async fn find_questions(&self, ids: &[Uuid]) -> MongoResult<Vec<QuestionEntity>> {
        let documents: Vec<MongoQuestionDocument> = self
            .questions()
            .await
            .find(doc! {"_id": {"$in": uuid_strings(ids)}})
            .await
            .map_err(|source| MongoDaoError::LoadQuestions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadQuestions { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_player(&self, id: Uuid) -> MongoResult<Option<PlayerEntity>> {
        self.database()
            .await
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { id, source })?
            .map(TryInto::try_into)
            .transpose()
    }
}

impl QuestionBank for MongoQuizStore {
    fn published_random_set(
        &self,
        count: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.published_random_set(count).await.map_err(Into::into) })
    }

    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let found = store.find_questions(&[id]).await?;
            Ok(found.into_iter().next())
        })
    }

    fn find_questions(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_questions(&ids).await.map_err(Into::into) })
    }
}

impl PlayerDirectory for MongoQuizStore {
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(id).await.map_err(Into::into) })
    }
}

impl QuizStore for MongoQuizStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn UnitOfWork>>> {
        let store = self.clone();
        Box::pin(async move {
            let uow = store.begin().await?;
            Ok(Box::new(uow) as Box<dyn UnitOfWork>)
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_one_game(doc_id(id)).await.map_err(Into::into) })
    }

    fn find_unfinished_game_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one_game(unfinished_filter(player_id))
                .await
                .map_err(Into::into)
        })
    }

    fn page_games_for_player(
        &self,
        player_id: Uuid,
        skip: u64,
        limit: u64,
    ) -> BoxFuture<'static, StorageResult<GamePage>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .page_games(player_id, skip, limit)
                .await
                .map_err(Into::into)
        })
    }

    fn find_finished_games_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = participant_filter(player_id);
            filter.insert("status", GameStatus::Finished.as_str());
            store.find_games(filter).await.map_err(Into::into)
        })
    }

    fn find_progresses(
        &self,
        game_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerProgressEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_progresses(&game_ids).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
