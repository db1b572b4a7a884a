use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        AnswerEntity, AnswerStatus, GameSessionEntity, GameStatus, PlayerProgressEntity,
        QuestionEntity,
    },
    dto::format_system_time,
};

/// Upper bound on the length of a submitted answer.
const MAX_ANSWER_LENGTH: u64 = 1_000;
/// Page size applied when the client does not send one.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u64 = 50;

/// Lifecycle status as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum GameStatusDto {
    PendingSecondPlayer,
    Active,
    Finished,
}

impl From<GameStatus> for GameStatusDto {
    fn from(value: GameStatus) -> Self {
        match value {
            GameStatus::Pending => GameStatusDto::PendingSecondPlayer,
            GameStatus::Active => GameStatusDto::Active,
            GameStatus::Finished => GameStatusDto::Finished,
        }
    }
}

/// Grading outcome as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum AnswerStatusDto {
    Correct,
    Incorrect,
}

impl From<AnswerStatus> for AnswerStatusDto {
    fn from(value: AnswerStatus) -> Self {
        match value {
            AnswerStatus::Correct => AnswerStatusDto::Correct,
            AnswerStatus::Incorrect => AnswerStatusDto::Incorrect,
        }
    }
}

/// Body of an answer submission.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// Free-text answer to the next unanswered question.
    #[validate(length(max = MAX_ANSWER_LENGTH))]
    pub answer: String,
    /// 0-based slot the client believes it is answering. When present, a submission whose slot
    /// was already answered is rejected instead of being recorded against the next question.
    #[serde(default)]
    pub position: Option<usize>,
}

/// Answer as recorded in a player's progress.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerView {
    pub question_id: Uuid,
    pub answer_status: AnswerStatusDto,
    /// RFC 3339 submission time.
    pub added_at: String,
}

impl From<&AnswerEntity> for AnswerView {
    fn from(answer: &AnswerEntity) -> Self {
        Self {
            question_id: answer.question_id,
            answer_status: answer.status.into(),
            added_at: format_system_time(answer.created_at),
        }
    }
}

/// Response of a successful answer submission.
pub type AnswerResultResponse = AnswerView;

/// Public identity of a player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: Uuid,
    pub login: String,
}

/// One player's side of a game.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerProgressView {
    /// Answers in the order the questions were asked.
    pub answers: Vec<AnswerView>,
    pub player: PlayerView,
    /// Correct answers plus the finish bonus, if earned.
    pub score: u32,
}

impl From<&PlayerProgressEntity> for PlayerProgressView {
    fn from(progress: &PlayerProgressEntity) -> Self {
        Self {
            answers: progress.answers.iter().map(Into::into).collect(),
            player: PlayerView {
                id: progress.player_id,
                login: progress.login.clone(),
            },
            score: progress.score,
        }
    }
}

/// Question as shown to players. Accepted answers are never exposed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    pub id: Uuid,
    pub body: String,
}

/// Full projection of a pair game.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSessionView {
    pub id: Uuid,
    pub first_player_progress: PlayerProgressView,
    /// Null while the game waits for a second player.
    pub second_player_progress: Option<PlayerProgressView>,
    /// Null while the game waits for a second player, then in the order they are asked.
    pub questions: Option<Vec<QuestionView>>,
    pub status: GameStatusDto,
    pub pair_created_date: String,
    pub start_game_date: Option<String>,
    pub finish_game_date: Option<String>,
}

impl GameSessionView {
    /// Assemble the view of `game` from batch-loaded progress rows and questions.
    ///
    /// Rows belonging to other games are ignored. A participant without a progress row is shown
    /// with an empty progress, which only happens if storage was edited by hand.
    pub fn assemble(
        game: &GameSessionEntity,
        progresses: &[PlayerProgressEntity],
        bank: &HashMap<Uuid, QuestionEntity>,
    ) -> Self {
        let progress_of = |player_id: Uuid| {
            progresses
                .iter()
                .find(|progress| progress.game_id == game.id && progress.player_id == player_id)
                .map(PlayerProgressView::from)
                .unwrap_or_else(|| PlayerProgressView {
                    answers: Vec::new(),
                    player: PlayerView {
                        id: player_id,
                        login: String::new(),
                    },
                    score: 0,
                })
        };

        let revealed = game.status != GameStatus::Pending;
        let questions = revealed.then(|| {
            game.question_ids
                .iter()
                .map(|id| QuestionView {
                    id: *id,
                    body: bank
                        .get(id)
                        .map(|question| question.body.clone())
                        .unwrap_or_default(),
                })
                .collect()
        });

        Self {
            id: game.id,
            first_player_progress: progress_of(game.first_player_id),
            second_player_progress: game
                .second_player_id
                .filter(|_| revealed)
                .map(progress_of),
            questions,
            status: game.status.into(),
            pair_created_date: format_system_time(game.created_at),
            start_game_date: game.started_at.map(format_system_time),
            finish_game_date: game.finished_at.map(format_system_time),
        }
    }
}

/// Paging parameters of the game history.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct MyGamesQuery {
    /// 1-based page number, 1 when omitted.
    #[validate(range(min = 1))]
    pub page_number: Option<u64>,
    /// Games per page, between 1 and 50, 10 when omitted.
    #[validate(range(min = 1, max = MAX_PAGE_SIZE))]
    pub page_size: Option<u64>,
}

impl MyGamesQuery {
    /// Requested page, 1-based.
    pub fn page_number(&self) -> u64 {
        self.page_number.unwrap_or(1)
    }

    /// Requested number of games per page.
    pub fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Number of games to skip before the requested page.
    pub fn skip(&self) -> u64 {
        self.page_number()
            .saturating_sub(1)
            .saturating_mul(self.page_size())
    }
}

/// One page of the player's game history, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedGamesResponse {
    /// Number of pages at the requested page size.
    pub pages_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub items: Vec<GameSessionView>,
}

impl PaginatedGamesResponse {
    /// Wrap one page of `items` out of `total_count` games.
    pub fn new(query: &MyGamesQuery, total_count: u64, items: Vec<GameSessionView>) -> Self {
        let page_size = query.page_size();
        Self {
            pages_count: total_count.div_ceil(page_size),
            page: query.page_number(),
            page_size,
            total_count,
            items,
        }
    }
}

/// Aggregated results of the player's finished games.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatisticView {
    pub sum_score: u64,
    /// Mean score per game, rounded to two decimals.
    pub avg_scores: f64,
    pub games_count: u64,
    pub wins_count: u64,
    pub losses_count: u64,
    pub draws_count: u64,
}
