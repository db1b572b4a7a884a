//! In-memory quiz store used by tests and local development.
//!
//! Units of work are fully serializable: `begin` takes the table lock and holds it until the unit
//! of work is committed, rolled back or dropped. Writes are staged on a private copy of the tables
//! and only replace the shared tables on commit. Plain reads on the store wait for the table lock,
//! so they must never be issued from inside a unit of work. The question bank and the player
//! directory live behind their own locks and stay readable at any time.

use std::{collections::HashSet, sync::Arc};

use futures::future::{BoxFuture, ready};
use indexmap::IndexMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::{GamePage, PlayerDirectory, QuestionBank, QuizStore, UnitOfWork, sample_ids};
use crate::dao::{
    models::{GameSessionEntity, GameStatus, PlayerEntity, PlayerProgressEntity, QuestionEntity},
    storage::StorageResult,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    games: IndexMap<Uuid, GameSessionEntity>,
    progresses: IndexMap<Uuid, PlayerProgressEntity>,
}

impl Tables {
    fn unfinished_game_for(&self, player_id: Uuid) -> Option<&GameSessionEntity> {
        self.games
            .values()
            .find(|game| game.status.is_unfinished() && game.is_participant(player_id))
    }

    fn progresses_of(&self, game_ids: &HashSet<Uuid>) -> Vec<PlayerProgressEntity> {
        self.progresses
            .values()
            .filter(|progress| game_ids.contains(&progress.game_id))
            .cloned()
            .collect()
    }
}

/// Quiz store keeping every table in process memory.
#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    tables: Arc<Mutex<Tables>>,
    questions: RwLock<IndexMap<Uuid, QuestionEntity>>,
    players: RwLock<IndexMap<Uuid, PlayerEntity>>,
}

impl MemoryQuizStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a question bank and a player directory.
    pub async fn with_fixtures(
        questions: impl IntoIterator<Item = QuestionEntity>,
        players: impl IntoIterator<Item = PlayerEntity>,
    ) -> Self {
        let store = Self::new();
        for question in questions {
            store.insert_question(question).await;
        }
        for player in players {
            store.insert_player(player).await;
        }
        store
    }

    /// Add or replace a question in the bank.
    pub async fn insert_question(&self, question: QuestionEntity) {
        let mut guard = self.inner.questions.write().await;
        guard.insert(question.id, question);
    }

    /// Add or replace a player account.
    pub async fn insert_player(&self, player: PlayerEntity) {
        let mut guard = self.inner.players.write().await;
        guard.insert(player.id, player);
    }
}

impl QuestionBank for MemoryQuizStore {
    fn published_random_set(
        &self,
        count: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.inner.questions.read().await;
            let published = guard
                .values()
                .filter(|question| question.published)
                .map(|question| question.id)
                .collect();

            Ok(sample_ids(published, count)
                .into_iter()
                .filter_map(|id| guard.get(&id).cloned())
                .collect())
        })
    }

    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.questions.read().await.get(&id).cloned()) })
    }

    fn find_questions(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.inner.questions.read().await;
            let wanted: HashSet<Uuid> = ids.into_iter().collect();
            Ok(wanted
                .into_iter()
                .filter_map(|id| guard.get(&id).cloned())
                .collect())
        })
    }
}

impl PlayerDirectory for MemoryQuizStore {
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.players.read().await.get(&id).cloned()) })
    }
}

impl QuizStore for MemoryQuizStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn UnitOfWork>>> {
        let tables = self.inner.tables.clone();
        Box::pin(async move {
            let guard = tables.lock_owned().await;
            let staged = Tables::clone(&guard);
            Ok(Box::new(MemoryUnitOfWork { guard, staged }) as Box<dyn UnitOfWork>)
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let tables = self.inner.tables.clone();
        Box::pin(async move { Ok(tables.lock().await.games.get(&id).cloned()) })
    }

    fn find_unfinished_game_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let tables = self.inner.tables.clone();
        Box::pin(async move { Ok(tables.lock().await.unfinished_game_for(player_id).cloned()) })
    }

    fn page_games_for_player(
        &self,
        player_id: Uuid,
        skip: u64,
        limit: u64,
    ) -> BoxFuture<'static, StorageResult<GamePage>> {
        let tables = self.inner.tables.clone();
        Box::pin(async move {
            let guard = tables.lock().await;
            let mut games: Vec<GameSessionEntity> = guard
                .games
                .values()
                .filter(|game| game.is_participant(player_id))
                .cloned()
                .collect();
            drop(guard);

            games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let total = games.len() as u64;
            let items = games
                .into_iter()
                .skip(usize::try_from(skip).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect();

            Ok(GamePage { items, total })
        })
    }

    fn find_finished_games_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let tables = self.inner.tables.clone();
        Box::pin(async move {
            Ok(tables
                .lock()
                .await
                .games
                .values()
                .filter(|game| game.status == GameStatus::Finished && game.is_participant(player_id))
                .cloned()
                .collect())
        })
    }

    fn find_progresses(
        &self,
        game_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerProgressEntity>>> {
        let tables = self.inner.tables.clone();
        Box::pin(async move {
            let wanted: HashSet<Uuid> = game_ids.into_iter().collect();
            Ok(tables.lock().await.progresses_of(&wanted))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }
}

/// Serializable unit of work holding the table lock for its whole lifetime.
struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl UnitOfWork for MemoryUnitOfWork {
    // The table lock is already exclusive.
    fn lock_player(&mut self, _player_id: Uuid) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }

    fn find_unfinished_game_for_player(
        &mut self,
        player_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        let game = self.staged.unfinished_game_for(player_id).cloned();
        Box::pin(ready(Ok(game)))
    }

    fn lock_oldest_pending_game(
        &mut self,
        excluded_player: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        let game = self
            .staged
            .games
            .values()
            .filter(|game| {
                game.status == GameStatus::Pending && game.first_player_id != excluded_player
            })
            .min_by_key(|game| game.created_at)
            .cloned();
        Box::pin(ready(Ok(game)))
    }

    fn lock_active_game_for_player(
        &mut self,
        player_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        let game = self
            .staged
            .games
            .values()
            .find(|game| game.status == GameStatus::Active && game.is_participant(player_id))
            .cloned();
        Box::pin(ready(Ok(game)))
    }

    fn find_progresses(
        &mut self,
        game_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Vec<PlayerProgressEntity>>> {
        let progresses = self.staged.progresses_of(&HashSet::from([game_id]));
        Box::pin(ready(Ok(progresses)))
    }

    fn save_game(&mut self, game: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.staged.games.insert(game.id, game);
        Box::pin(ready(Ok(())))
    }

    fn save_progress(
        &mut self,
        progress: PlayerProgressEntity,
    ) -> BoxFuture<'_, StorageResult<()>> {
        self.staged.progresses.insert(progress.id, progress);
        Box::pin(ready(Ok(())))
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Box::pin(ready(Ok(())))
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        drop(self);
        Box::pin(ready(Ok(())))
    }
}
