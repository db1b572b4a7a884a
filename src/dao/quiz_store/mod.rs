//! Storage seams of the quiz engine and their backends.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{GameSessionEntity, PlayerEntity, PlayerProgressEntity, QuestionEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use rand::{rng, seq::SliceRandom};
use uuid::Uuid;

/// Read-only access to the question bank.
pub trait QuestionBank: Send + Sync {
    /// Draw up to `count` distinct published questions, uniformly at random.
    fn published_random_set(&self, count: usize)
    -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Fetch a single question regardless of its publication state.
    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    /// Fetch every known question among `ids`. Unknown ids are skipped; order is unspecified.
    fn find_questions(&self, ids: Vec<Uuid>)
    -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
}

/// Read-only access to user accounts.
pub trait PlayerDirectory: Send + Sync {
    /// Fetch the account of `id`, if it exists.
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
}

/// One page of games plus the total number of matching games.
#[derive(Debug, Clone, Default)]
pub struct GamePage {
    /// Games of the requested page.
    pub items: Vec<GameSessionEntity>,
    /// Number of matching games across every page.
    pub total: u64,
}

/// Abstraction over the persistence layer for pair games and player progress.
///
/// Plain reads see committed state only. Every mutation goes through a [`UnitOfWork`].
pub trait QuizStore: QuestionBank + PlayerDirectory {
    /// Open a new atomic unit of work.
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn UnitOfWork>>>;
    /// Committed state of a single game.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    /// Committed pending or active game of `player_id`.
    fn find_unfinished_game_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    /// Games the player took part in, newest first.
    fn page_games_for_player(
        &self,
        player_id: Uuid,
        skip: u64,
        limit: u64,
    ) -> BoxFuture<'static, StorageResult<GamePage>>;
    /// Every finished game `player_id` took part in.
    fn find_finished_games_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>>;
    /// Progress rows of every game in `game_ids`, fetched in one round trip.
    fn find_progresses(
        &self,
        game_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerProgressEntity>>>;
    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Atomic unit of work against the quiz store.
///
/// `lock_*` methods read a row and hold it against concurrent units of work until commit or
/// rollback. Dropping a unit of work without committing discards every staged write.
pub trait UnitOfWork: Send {
    /// Serialize concurrent units of work acting on behalf of the same player.
    fn lock_player(&mut self, player_id: Uuid) -> BoxFuture<'_, StorageResult<()>>;
    /// Pending or active game of `player_id`, as seen by this unit of work.
    fn find_unfinished_game_for_player(
        &mut self,
        player_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>>;
    /// Lock the oldest pending game not created by `excluded_player`.
    fn lock_oldest_pending_game(
        &mut self,
        excluded_player: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>>;
    /// Lock the active game `player_id` participates in.
    fn lock_active_game_for_player(
        &mut self,
        player_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>>;
    /// Both progress rows of `game_id`, as seen by this unit of work.
    fn find_progresses(
        &mut self,
        game_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Vec<PlayerProgressEntity>>>;
    /// Stage an insert or replacement of `game`.
    fn save_game(&mut self, game: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>>;
    /// Stage an insert or replacement of `progress`.
    fn save_progress(&mut self, progress: PlayerProgressEntity)
    -> BoxFuture<'_, StorageResult<()>>;
    /// Publish every staged write atomically.
    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>>;
    /// Discard every staged write and release held locks.
    fn rollback(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>>;
}

/// Keep `count` ids picked uniformly at random without repetition.
pub(crate) fn sample_ids(mut ids: Vec<Uuid>, count: usize) -> Vec<Uuid> {
    ids.shuffle(&mut rng());
    ids.truncate(count);
    ids
}
