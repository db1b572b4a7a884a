use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    ClientSession, Collection, Database,
    bson::{Document, doc},
    error::UNKNOWN_TRANSACTION_COMMIT_RESULT,
    options::ReturnDocument,
};
use tracing::warn;
use uuid::Uuid;

use super::{
    error::{MongoDaoError, MongoResult},
    models::{
        GAME_COLLECTION_NAME, MongoGameDocument, MongoProgressDocument,
        PLAYER_LOCK_COLLECTION_NAME, PROGRESS_COLLECTION_NAME, doc_id, lock_update,
        participant_filter, unfinished_filter,
    },
};
use crate::dao::{
    models::{GameSessionEntity, GameStatus, PlayerProgressEntity},
    quiz_store::UnitOfWork,
    storage::StorageResult,
};

const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Unit of work backed by a multi-document transaction on one client session.
///
/// Reads run at snapshot isolation. "Lock" reads bump a counter on the document they return so
/// that any concurrent transaction touching the same document aborts with a write conflict.
pub struct MongoUnitOfWork {
    session: ClientSession,
    database: Database,
}

impl MongoUnitOfWork {
    pub(super) fn new(session: ClientSession, database: Database) -> Self {
        Self { session, database }
    }

    fn games(&self) -> Collection<MongoGameDocument> {
        self.database.collection(GAME_COLLECTION_NAME)
    }

    fn progresses(&self) -> Collection<MongoProgressDocument> {
        self.database.collection(PROGRESS_COLLECTION_NAME)
    }

    async fn acquire_player_lock(&mut self, player_id: Uuid) -> MongoResult<()> {
        self.database
            .collection::<Document>(PLAYER_LOCK_COLLECTION_NAME)
            .update_one(doc_id(player_id), doc! {"$inc": {"version": 1_i64}})
            .upsert(true)
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::LockPlayer {
                id: player_id,
                source,
            })?;
        Ok(())
    }

    async fn lock_game(
        &mut self,
        player_id: Uuid,
        filter: Document,
    ) -> MongoResult<Option<GameSessionEntity>> {
        self.games()
            .find_one_and_update(filter, lock_update())
            .sort(doc! {"created_at": 1})
            .return_document(ReturnDocument::After)
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::LockGame { player_id, source })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn find_unfinished_game(
        &mut self,
        player_id: Uuid,
    ) -> MongoResult<Option<GameSessionEntity>> {
        self.games()
            .find_one(unfinished_filter(player_id))
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::LoadGames { source })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn load_progresses(&mut self, game_id: Uuid) -> MongoResult<Vec<PlayerProgressEntity>> {
        let mut cursor = self
            .progresses()
            .find(doc! {"game_id": game_id.to_string()})
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::LoadProgresses { source })?;

        let documents: Vec<MongoProgressDocument> = cursor
            .stream(&mut self.session)
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadProgresses { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn write_game(&mut self, game: GameSessionEntity) -> MongoResult<()> {
        let id = game.id;
        self.games()
            .replace_one(doc_id(id), MongoGameDocument::from(game))
            .upsert(true)
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::SaveGame { id, source })?;
        Ok(())
    }

    async fn write_progress(&mut self, progress: PlayerProgressEntity) -> MongoResult<()> {
        let id = progress.id;
        self.progresses()
            .replace_one(doc_id(id), MongoProgressDocument::from(progress))
            .upsert(true)
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::SaveProgress { id, source })?;
        Ok(())
    }

    async fn commit_with_retry(mut self) -> MongoResult<()> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.session.commit_transaction().await {
                Ok(()) => return Ok(()),
                // Only the commit is replayed; the staged writes stay with the session.
                Err(err)
                    if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                        && attempts < MAX_COMMIT_ATTEMPTS =>
                {
                    warn!(attempts, error = %err, "retrying transaction commit");
                }
                Err(source) => return Err(MongoDaoError::CommitTransaction { source }),
            }
        }
    }

    async fn abort(mut self) -> MongoResult<()> {
        self.session
            .abort_transaction()
            .await
            .map_err(|source| MongoDaoError::AbortTransaction { source })
    }
}

impl UnitOfWork for MongoUnitOfWork {
    fn lock_player(&mut self, player_id: Uuid) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move { self.acquire_player_lock(player_id).await.map_err(Into::into) })
    }

    fn find_unfinished_game_for_player(
        &mut self,
        player_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        Box::pin(async move { self.find_unfinished_game(player_id).await.map_err(Into::into) })
    }

    fn lock_oldest_pending_game(
        &mut self,
        excluded_player: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        let filter = doc! {
            "status": GameStatus::Pending.as_str(),
            "first_player_id": {"$ne": excluded_player.to_string()},
        };
        Box::pin(async move {
            self.lock_game(excluded_player, filter)
                .await
                .map_err(Into::into)
        })
    }

    fn lock_active_game_for_player(
        &mut self,
        player_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        let mut filter = participant_filter(player_id);
        filter.insert("status", GameStatus::Active.as_str());
        Box::pin(async move { self.lock_game(player_id, filter).await.map_err(Into::into) })
    }

    fn find_progresses(
        &mut self,
        game_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Vec<PlayerProgressEntity>>> {
        Box::pin(async move { self.load_progresses(game_id).await.map_err(Into::into) })
    }

    fn save_game(&mut self, game: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move { self.write_game(game).await.map_err(Into::into) })
    }

    fn save_progress(
        &mut self,
        progress: PlayerProgressEntity,
    ) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move { self.write_progress(progress).await.map_err(Into::into) })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async move { self.commit_with_retry().await.map_err(Into::into) })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async move { self.abort().await.map_err(Into::into) })
    }
}
