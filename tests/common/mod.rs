#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use pair_quiz_back::{
    config::{AppConfig, Fixtures, QuizRules, TransactionPolicy},
    dao::{
        models::{PlayerEntity, QuestionEntity},
        quiz_store::memory::MemoryQuizStore,
    },
    dto::game::{AnswerView, GameSessionView, SubmitAnswerRequest},
    error::ServiceError,
    services::{matchmaker, query_service, turn_engine},
    state::{AppState, SharedState},
};
use uuid::Uuid;

pub const QUESTIONS_PER_GAME: usize = 5;

/// Application state over an in-memory store seeded with questions and players.
pub struct TestApp {
    pub state: SharedState,
    pub store: MemoryQuizStore,
    /// Accepted answer of every published question.
    pub answers: HashMap<Uuid, String>,
    pub players: Vec<PlayerEntity>,
}

/// Seed `published` answerable questions, two unpublished ones and `players` players.
pub async fn test_app(published: usize, players: usize) -> TestApp {
    let now = SystemTime::now();
    let mut answers = HashMap::new();
    let mut questions = Vec::new();

    for index in 0..published {
        let question = QuestionEntity {
            id: Uuid::new_v4(),
            body: format!("Question {index}"),
            accepted_answers: vec![format!("answer-{index}")],
            published: true,
            created_at: now,
            updated_at: None,
        };
        answers.insert(question.id, question.accepted_answers[0].clone());
        questions.push(question);
    }
    for index in 0..2 {
        questions.push(QuestionEntity {
            id: Uuid::new_v4(),
            body: format!("Draft {index}"),
            accepted_answers: vec!["draft".into()],
            published: false,
            created_at: now,
            updated_at: None,
        });
    }

    let players: Vec<PlayerEntity> = (0..players)
        .map(|index| PlayerEntity {
            id: Uuid::new_v4(),
            login: format!("player{index}"),
        })
        .collect();

    let store = MemoryQuizStore::with_fixtures(questions, players.clone()).await;
    let config = AppConfig::new(
        QuizRules::default(),
        TransactionPolicy {
            max_attempts: 10,
            timeout: Duration::from_secs(5),
        },
        Fixtures::default(),
    );
    let state = AppState::new(config);
    state.install_store(Arc::new(store.clone())).await;

    TestApp {
        state,
        store,
        answers,
        players,
    }
}

impl TestApp {
    pub fn player(&self, index: usize) -> Uuid {
        self.players[index].id
    }

    pub async fn connect(&self, player_id: Uuid) -> Result<GameSessionView, ServiceError> {
        matchmaker::connect(&self.state, player_id).await
    }

    pub async fn current(&self, player_id: Uuid) -> Result<GameSessionView, ServiceError> {
        query_service::current_game(&self.state, player_id).await
    }

    /// Answer the next question of the player's current game, right or wrong.
    pub async fn answer_next(
        &self,
        player_id: Uuid,
        correct: bool,
    ) -> Result<AnswerView, ServiceError> {
        let answer = match self.next_question(player_id).await {
            Some(question_id) if correct => self.answers[&question_id].clone(),
            _ => "definitely wrong".to_owned(),
        };

        turn_engine::answer(
            &self.state,
            player_id,
            SubmitAnswerRequest {
                answer,
                position: None,
            },
        )
        .await
    }

    /// Identifier of the next unanswered question of the player's current game.
    pub async fn next_question(&self, player_id: Uuid) -> Option<Uuid> {
        let view = self.current(player_id).await.ok()?;
        let answered = progress_of(&view, player_id)?.answers.len();
        view.questions?.get(answered).map(|question| question.id)
    }
}

/// Progress of `player_id` inside `view`.
pub fn progress_of(
    view: &GameSessionView,
    player_id: Uuid,
) -> Option<&pair_quiz_back::dto::game::PlayerProgressView> {
    [
        Some(&view.first_player_progress),
        view.second_player_progress.as_ref(),
    ]
    .into_iter()
    .flatten()
    .find(|progress| progress.player.id == player_id)
}
