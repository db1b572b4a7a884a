use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Quiz question owned by the question bank administration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Text shown to the players.
    pub body: String,
    /// Literal answers accepted as correct, in authoring order.
    pub accepted_answers: Vec<String>,
    /// Only published questions can be drawn into a new game.
    pub published: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the question was edited, if ever.
    pub updated_at: Option<SystemTime>,
}

/// Read-only projection of a user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Account identifier.
    pub id: Uuid,
    /// Display name.
    pub login: String,
}

/// Lifecycle status of a pair game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Waiting for a second player.
    Pending,
    /// Both players joined and questions are assigned.
    Active,
    /// Both players answered every question.
    Finished,
}

impl GameStatus {
    /// Pending and active games still count as the player's current game.
    pub fn is_unfinished(self) -> bool {
        !matches!(self, GameStatus::Finished)
    }

    /// Stable lowercase name used by storage filters.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Pending => "pending",
            GameStatus::Active => "active",
            GameStatus::Finished => "finished",
        }
    }
}

/// Aggregate pair game entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSessionEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Player who created the game.
    pub first_player_id: Uuid,
    /// Player who joined the pending game.
    pub second_player_id: Option<Uuid>,
    /// Current lifecycle status.
    pub status: GameStatus,
    /// Questions drawn at activation. Empty while pending.
    pub question_ids: Vec<Uuid>,
    /// Creation timestamp (the pair creation date).
    pub created_at: SystemTime,
    /// When the second player joined.
    pub started_at: Option<SystemTime>,
    /// When both players completed.
    pub finished_at: Option<SystemTime>,
}

impl GameSessionEntity {
    /// Fresh pending game created by `first_player_id`.
    pub fn pending(first_player_id: Uuid, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_player_id,
            second_player_id: None,
            status: GameStatus::Pending,
            question_ids: Vec::new(),
            created_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether `player_id` is one of the two participants.
    pub fn is_participant(&self, player_id: Uuid) -> bool {
        self.first_player_id == player_id || self.second_player_id == Some(player_id)
    }

    /// Identifier of the other participant, if the game has one.
    pub fn opponent_of(&self, player_id: Uuid) -> Option<Uuid> {
        if self.first_player_id == player_id {
            self.second_player_id
        } else if self.second_player_id == Some(player_id) {
            Some(self.first_player_id)
        } else {
            None
        }
    }
}

/// Grading outcome of a single answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// Matched one of the accepted answers.
    Correct,
    /// Matched none of the accepted answers.
    Incorrect,
}

/// Answer recorded in a player's progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Question the answer was graded against.
    pub question_id: Uuid,
    /// Raw text as submitted by the player.
    pub text: String,
    /// Grading outcome.
    pub status: AnswerStatus,
    /// Submission timestamp.
    pub created_at: SystemTime,
}

/// Per-player state within a pair game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerProgressEntity {
    /// Primary key of the progress row.
    pub id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// Owning player.
    pub player_id: Uuid,
    /// Player login captured when the progress was created.
    pub login: String,
    /// Correct answers plus any finish bonus.
    pub score: u32,
    /// Answers in submission order; position `i` answers `question_ids[i]`.
    pub answers: Vec<AnswerEntity>,
    /// Set when the last answer of the quota is recorded.
    pub completed_at: Option<SystemTime>,
}

impl PlayerProgressEntity {
    /// Empty progress for `player` inside `game_id`.
    pub fn new(game_id: Uuid, player: &PlayerEntity) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            player_id: player.id,
            login: player.login.clone(),
            score: 0,
            answers: Vec::new(),
            completed_at: None,
        }
    }

    /// Whether the player has answered the whole quota.
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_game_has_no_questions_nor_opponent() {
        let creator = Uuid::new_v4();
        let game = GameSessionEntity::pending(creator, SystemTime::now());

        assert_eq!(game.status, GameStatus::Pending);
        assert!(game.question_ids.is_empty());
        assert!(game.is_participant(creator));
        assert_eq!(game.opponent_of(creator), None);
        assert!(game.started_at.is_none());
    }

    #[test]
    fn opponent_lookup_is_symmetric() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut game = GameSessionEntity::pending(first, SystemTime::now());
        game.second_player_id = Some(second);

        assert_eq!(game.opponent_of(first), Some(second));
        assert_eq!(game.opponent_of(second), Some(first));
        assert_eq!(game.opponent_of(Uuid::new_v4()), None);
        assert!(!game.is_participant(Uuid::new_v4()));
    }

    #[test]
    fn status_serializes_snake_case() {
        let value = serde_json::to_value(GameStatus::Finished).unwrap();
        assert_eq!(value, serde_json::json!("finished"));
        assert!(GameStatus::Pending.is_unfinished());
        assert!(!GameStatus::Finished.is_unfinished());
    }
}
