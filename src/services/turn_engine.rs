//! Answer submission: sequencing, grading, scoring and game completion.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::QuizRules,
    dao::{
        models::{AnswerEntity, AnswerStatus, PlayerProgressEntity},
        quiz_store::{QuestionBank, UnitOfWork},
    },
    dto::game::{AnswerResultResponse, SubmitAnswerRequest},
    error::{ForbiddenReason, ServiceError},
    services::{grader, unit_of_work},
    state::{
        SharedState,
        lifecycle::{self, GameEvent},
    },
};

/// Answer submitted by a player.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Free-text answer as typed by the player.
    pub text: String,
    /// Slot the client believes it is answering, if it sent one.
    pub position: Option<usize>,
}

/// Record the answer of `player_id` to the next question of their active game.
///
/// Must run inside a unit of work. The active game is locked before both progress rows are
/// read, so the finish check below always sees the opponent's latest state.
pub async fn submit_answer<Q>(
    uow: &mut dyn UnitOfWork,
    questions: &Q,
    rules: &QuizRules,
    player_id: Uuid,
    submission: &Submission,
    now: SystemTime,
) -> Result<AnswerEntity, ServiceError>
where
    Q: QuestionBank + ?Sized,
{
    let mut game = uow
        .lock_active_game_for_player(player_id)
        .await?
        .ok_or(ServiceError::Forbidden(ForbiddenReason::NotInGame))?;

    let mut progresses = uow.find_progresses(game.id).await?;
    let mine_index = progresses
        .iter()
        .position(|progress| progress.player_id == player_id)
        .ok_or_else(|| {
            ServiceError::InvalidState(format!("game {} has no progress for player", game.id))
        })?;
    let mut mine = progresses.swap_remove(mine_index);
    let opponent_id = game.opponent_of(player_id);
    let mut theirs = progresses
        .into_iter()
        .find(|progress| Some(progress.player_id) == opponent_id);

    let answered = mine.answers.len();
    let Some(&question_id) = game.question_ids.get(answered) else {
        return Err(ServiceError::Forbidden(ForbiddenReason::AnswersExhausted));
    };
    if let Some(position) = submission.position.filter(|position| *position != answered) {
        return Err(ServiceError::InvalidState(format!(
            "answer position {position} is stale; next position is {answered}"
        )));
    }

    let question = questions
        .find_question(question_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("question {question_id}")))?;
    let status = grader::grade(
        rules.answer_matching,
        &submission.text,
        &question.accepted_answers,
    );

    let answer = AnswerEntity {
        question_id,
        text: submission.text.clone(),
        status,
        created_at: now,
    };
    mine.answers.push(answer.clone());
    if status == AnswerStatus::Correct {
        mine.score += 1;
    }
    if mine.answers.len() == game.question_ids.len() {
        mine.completed_at = Some(now);
        debug!(game_id = %game.id, %player_id, score = mine.score, "player completed the game");
    }

    let opponent = theirs
        .as_mut()
        .filter(|opponent| mine.is_complete() && opponent.is_complete());
    if let Some(opponent) = opponent {
        lifecycle::apply(&mut game, GameEvent::BothPlayersCompleted { at: now })?;
        award_finish_bonus(&mut mine, opponent);
        info!(
            game_id = %game.id,
            first_player_id = %game.first_player_id,
            "pair game finished"
        );
        uow.save_progress(opponent.clone()).await?;
        uow.save_game(game).await?;
    }
    uow.save_progress(mine).await?;

    Ok(answer)
}

/// Give one extra point to the player who completed first, unless they scored nothing.
///
/// `submitter` completed last. When both completion times are equal, `opponent` was already
/// complete when `submitter` finished and counts as first.
pub fn award_finish_bonus(submitter: &mut PlayerProgressEntity, opponent: &mut PlayerProgressEntity) {
    let first = if opponent.completed_at <= submitter.completed_at {
        opponent
    } else {
        submitter
    };

    if first.score > 0 {
        first.score += 1;
    }
}

/// Submit the calling player's next answer.
pub async fn answer(
    state: &SharedState,
    player_id: Uuid,
    request: SubmitAnswerRequest,
) -> Result<AnswerResultResponse, ServiceError> {
    let store = state.require_store().await?;
    let rules = state.rules().clone();
    let submission = Submission {
        text: request.answer,
        position: request.position,
    };

    let bank = store.clone();
    let answer = unit_of_work::run(
        store.as_ref(),
        state.transaction_policy(),
        "submit_answer",
        move |uow| {
            let bank = bank.clone();
            let rules = rules.clone();
            let submission = submission.clone();
            Box::pin(async move {
                submit_answer(
                    uow,
                    bank.as_ref(),
                    &rules,
                    player_id,
                    &submission,
                    SystemTime::now(),
                )
                .await
            })
        },
    )
    .await?;

    Ok((&answer).into())
}
