use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    AnswerEntity, AnswerStatus, GameSessionEntity, GameStatus, PlayerEntity,
    PlayerProgressEntity, QuestionEntity,
};

/// Collection of pair games.
pub const GAME_COLLECTION_NAME: &str = "quiz_games";
/// Collection of per-player progress, answers embedded.
pub const PROGRESS_COLLECTION_NAME: &str = "quiz_progresses";
/// Question bank.
pub const QUESTION_COLLECTION_NAME: &str = "quiz_questions";
/// Player accounts.
pub const PLAYER_COLLECTION_NAME: &str = "players";
/// One row per player, written to serialize that player's joins.
pub const PLAYER_LOCK_COLLECTION_NAME: &str = "quiz_player_locks";

/// Stored shape of a pair game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    first_player_id: String,
    second_player_id: Option<String>,
    status: GameStatus,
    question_ids: Vec<String>,
    created_at: DateTime,
    started_at: Option<DateTime>,
    finished_at: Option<DateTime>,
}

impl From<GameSessionEntity> for MongoGameDocument {
    fn from(value: GameSessionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            first_player_id: value.first_player_id.to_string(),
            second_player_id: value.second_player_id.map(|id| id.to_string()),
            status: value.status,
            question_ids: value.question_ids.iter().map(Uuid::to_string).collect(),
            created_at: DateTime::from_system_time(value.created_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            finished_at: value.finished_at.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<MongoGameDocument> for GameSessionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameDocument) -> Result<Self, Self::Error> {
        let corrupt = |source| MongoDaoError::CorruptDocument {
            collection: GAME_COLLECTION_NAME,
            id: value.id.clone(),
            source,
        };

        Ok(Self {
            id: Uuid::parse_str(&value.id).map_err(corrupt)?,
            first_player_id: Uuid::parse_str(&value.first_player_id).map_err(corrupt)?,
            second_player_id: value
                .second_player_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(corrupt)?,
            status: value.status,
            question_ids: value
                .question_ids
                .iter()
                .map(|id| Uuid::parse_str(id))
                .collect::<Result<_, _>>()
                .map_err(corrupt)?,
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(DateTime::to_system_time),
            finished_at: value.finished_at.map(DateTime::to_system_time),
        })
    }
}

/// Answer embedded in a progress document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    question_id: String,
    text: String,
    status: AnswerStatus,
    created_at: DateTime,
}

/// Stored shape of a player's progress in one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProgressDocument {
    #[serde(rename = "_id")]
    id: String,
    game_id: String,
    player_id: String,
    login: String,
    score: i64,
    #[serde(default)]
    answers: Vec<MongoAnswerDocument>,
    completed_at: Option<DateTime>,
}

impl From<PlayerProgressEntity> for MongoProgressDocument {
    fn from(value: PlayerProgressEntity) -> Self {
        Self {
            id: value.id.to_string(),
            game_id: value.game_id.to_string(),
            player_id: value.player_id.to_string(),
            login: value.login,
            score: i64::from(value.score),
            answers: value
                .answers
                .into_iter()
                .map(|answer| MongoAnswerDocument {
                    question_id: answer.question_id.to_string(),
                    text: answer.text,
                    status: answer.status,
                    created_at: DateTime::from_system_time(answer.created_at),
                })
                .collect(),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<MongoProgressDocument> for PlayerProgressEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoProgressDocument) -> Result<Self, Self::Error> {
        let corrupt = |source| MongoDaoError::CorruptDocument {
            collection: PROGRESS_COLLECTION_NAME,
            id: value.id.clone(),
            source,
        };

        let answers = value
            .answers
            .iter()
            .map(|answer| {
                Ok(AnswerEntity {
                    question_id: Uuid::parse_str(&answer.question_id)?,
                    text: answer.text.clone(),
                    status: answer.status,
                    created_at: answer.created_at.to_system_time(),
                })
            })
            .collect::<Result<Vec<_>, uuid::Error>>()
            .map_err(corrupt)?;

        Ok(Self {
            id: Uuid::parse_str(&value.id).map_err(corrupt)?,
            game_id: Uuid::parse_str(&value.game_id).map_err(corrupt)?,
            player_id: Uuid::parse_str(&value.player_id).map_err(corrupt)?,
            login: value.login.clone(),
            score: u32::try_from(value.score).unwrap_or_default(),
            answers,
            completed_at: value.completed_at.map(DateTime::to_system_time),
        })
    }
}

/// Stored shape of a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    id: String,
    body: String,
    #[serde(default)]
    accepted_answers: Vec<String>,
    #[serde(default)]
    published: bool,
    created_at: DateTime,
    updated_at: Option<DateTime>,
}

impl TryFrom<MongoQuestionDocument> for QuestionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoQuestionDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|source| MongoDaoError::CorruptDocument {
            collection: QUESTION_COLLECTION_NAME,
            id: value.id.clone(),
            source,
        })?;

        Ok(Self {
            id,
            body: value.body,
            accepted_answers: value.accepted_answers,
            published: value.published,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.map(DateTime::to_system_time),
        })
    }
}

/// Stored shape of a player account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    login: String,
}

impl TryFrom<MongoPlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|source| MongoDaoError::CorruptDocument {
            collection: PLAYER_COLLECTION_NAME,
            id: value.id.clone(),
            source,
        })?;
        Ok(Self {
            id,
            login: value.login,
        })
    }
}

/// Filter selecting a document by id.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching the games `player_id` takes part in.
pub fn participant_filter(player_id: Uuid) -> Document {
    let id = player_id.to_string();
    doc! {"$or": [{"first_player_id": id.clone()}, {"second_player_id": id}]}
}

/// Filter matching the pending or active game of `player_id`.
pub fn unfinished_filter(player_id: Uuid) -> Document {
    let mut filter = participant_filter(player_id);
    filter.insert(
        "status",
        doc! {"$in": [GameStatus::Pending.as_str(), GameStatus::Active.as_str()]},
    );
    filter
}

/// Update applied by "lock and read" calls: any write takes the document lock for the
/// remainder of the transaction.
pub fn lock_update() -> Document {
    doc! {"$inc": {"lock_version": 1_i64}}
}

/// Ids as stored in documents.
pub fn uuid_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}
