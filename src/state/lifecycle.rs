//! Lifecycle of a pair game: `Pending -> Active -> Finished`.
//!
//! Every status change of a [`GameSessionEntity`] goes through [`apply`], which validates the
//! transition and updates the timestamps and question list that belong to it.

use std::time::SystemTime;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{GameSessionEntity, GameStatus};

/// Events that can be applied to a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A second player joined a pending game; its questions are now drawn.
    SecondPlayerJoined {
        /// The joining player.
        player_id: Uuid,
        /// Questions in the order they will be asked.
        question_ids: Vec<Uuid>,
        /// Activation time.
        at: SystemTime,
    },
    /// Both players answered the whole quota.
    BothPlayersCompleted {
        /// Finish time.
        at: SystemTime,
    },
}

impl GameEvent {
    fn name(&self) -> &'static str {
        match self {
            GameEvent::SecondPlayerJoined { .. } => "second_player_joined",
            GameEvent::BothPlayersCompleted { .. } => "both_players_completed",
        }
    }
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event} cannot be applied to game {game_id} while {from:?}")]
pub struct InvalidTransition {
    /// Game the event was applied to.
    pub game_id: Uuid,
    /// Status the game was in when the invalid event was received.
    pub from: GameStatus,
    /// Name of the rejected event.
    pub event: &'static str,
}

/// Compute the status reached by applying `event` from `from`.
pub fn next_status(from: GameStatus, event: &GameEvent) -> Option<GameStatus> {
    match (from, event) {
        (GameStatus::Pending, GameEvent::SecondPlayerJoined { .. }) => Some(GameStatus::Active),
        (GameStatus::Active, GameEvent::BothPlayersCompleted { .. }) => Some(GameStatus::Finished),
        _ => None,
    }
}

/// Apply `event` to `game`, returning the new status.
///
/// On error the game is left untouched.
pub fn apply(game: &mut GameSessionEntity, event: GameEvent) -> Result<GameStatus, InvalidTransition> {
    let invalid = |game: &GameSessionEntity, event: &GameEvent| InvalidTransition {
        game_id: game.id,
        from: game.status,
        event: event.name(),
    };

    let next = next_status(game.status, &event).ok_or_else(|| invalid(game, &event))?;

    match event {
        GameEvent::SecondPlayerJoined {
            player_id,
            question_ids,
            at,
        } => {
            if player_id == game.first_player_id || question_ids.is_empty() {
                return Err(invalid(
                    game,
                    &GameEvent::SecondPlayerJoined {
                        player_id,
                        question_ids,
                        at,
                    },
                ));
            }
            game.second_player_id = Some(player_id);
            game.question_ids = question_ids;
            game.started_at = Some(at);
        }
        GameEvent::BothPlayersCompleted { at } => {
            game.finished_at = Some(at);
        }
    }

    game.status = next;
    Ok(next)
}
