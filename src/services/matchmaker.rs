//! Join-or-create pairing of players into pair games.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    config::QuizRules,
    dao::{
        models::{GameSessionEntity, PlayerEntity, PlayerProgressEntity},
        quiz_store::{QuestionBank, UnitOfWork},
    },
    dto::game::GameSessionView,
    error::{ForbiddenReason, ServiceError},
    services::{query_service, unit_of_work},
    state::{
        SharedState,
        lifecycle::{self, GameEvent},
    },
};

/// Attach `player` to the oldest pending game of another player, or open a new pending game.
///
/// Must run inside a unit of work: the player lock serializes concurrent joins of the same
/// player, and the pending game is locked so that it is activated at most once.
pub async fn join_or_create<Q>(
    uow: &mut dyn UnitOfWork,
    questions: &Q,
    rules: &QuizRules,
    player: &PlayerEntity,
    now: SystemTime,
) -> Result<GameSessionEntity, ServiceError>
where
    Q: QuestionBank + ?Sized,
{
    uow.lock_player(player.id).await?;

    if uow
        .find_unfinished_game_for_player(player.id)
        .await?
        .is_some()
    {
        return Err(ServiceError::Forbidden(ForbiddenReason::AlreadyInGame));
    }

    let Some(mut game) = uow.lock_oldest_pending_game(player.id).await? else {
        let game = GameSessionEntity::pending(player.id, now);
        uow.save_game(game.clone()).await?;
        uow.save_progress(PlayerProgressEntity::new(game.id, player))
            .await?;
        info!(game_id = %game.id, player_id = %player.id, "opened pending game");
        return Ok(game);
    };

    let required = rules.questions_per_game;
    let drawn = questions.published_random_set(required).await?;
    if drawn.len() < required {
        return Err(ServiceError::InsufficientQuestions {
            required,
            available: drawn.len(),
        });
    }

    lifecycle::apply(
        &mut game,
        GameEvent::SecondPlayerJoined {
            player_id: player.id,
            question_ids: drawn.iter().map(|question| question.id).collect(),
            at: now,
        },
    )?;
    uow.save_progress(PlayerProgressEntity::new(game.id, player))
        .await?;
    uow.save_game(game.clone()).await?;

    info!(
        game_id = %game.id,
        first_player_id = %game.first_player_id,
        second_player_id = %player.id,
        "pair game started"
    );
    Ok(game)
}

/// Connect the calling player to a pair game and return its view.
pub async fn connect(state: &SharedState, player_id: Uuid) -> Result<GameSessionView, ServiceError> {
    let store = state.require_store().await?;
    let player = store
        .find_player(player_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player {player_id}")))?;
    let rules = state.rules().clone();

    let bank = store.clone();
    let game = unit_of_work::run(
        store.as_ref(),
        state.transaction_policy(),
        "join_or_create",
        move |uow| {
            let bank = bank.clone();
            let rules = rules.clone();
            let player = player.clone();
            Box::pin(async move {
                join_or_create(uow, bank.as_ref(), &rules, &player, SystemTime::now()).await
            })
        },
    )
    .await?;

    query_service::view_of(store.as_ref(), game).await
}
