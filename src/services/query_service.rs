//! Read-side projections of pair games. Only participants may see a game.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{
    dao::{
        models::{GameSessionEntity, PlayerProgressEntity},
        quiz_store::QuizStore,
    },
    dto::game::{GameSessionView, MyGamesQuery, PaginatedGamesResponse, StatisticView},
    error::{ForbiddenReason, ServiceError},
    state::SharedState,
};

/// Build the view of a single game.
pub async fn view_of<S>(store: &S, game: GameSessionEntity) -> Result<GameSessionView, ServiceError>
where
    S: QuizStore + ?Sized,
{
    let mut views = views_of(store, vec![game]).await?;
    views
        .pop()
        .ok_or_else(|| ServiceError::InvalidState("game view could not be built".into()))
}

/// Build the views of `games` with one progress query and one question query.
async fn views_of<S>(
    store: &S,
    games: Vec<GameSessionEntity>,
) -> Result<Vec<GameSessionView>, ServiceError>
where
    S: QuizStore + ?Sized,
{
    if games.is_empty() {
        return Ok(Vec::new());
    }

    let game_ids = games.iter().map(|game| game.id).collect();
    let question_ids: HashSet<Uuid> = games
        .iter()
        .flat_map(|game| game.question_ids.iter().copied())
        .collect();

    let progresses = store.find_progresses(game_ids).await?;
    let questions = if question_ids.is_empty() {
        HashMap::new()
    } else {
        store
            .find_questions(question_ids.into_iter().collect())
            .await?
            .into_iter()
            .map(|question| (question.id, question))
            .collect()
    };

    Ok(games
        .iter()
        .map(|game| GameSessionView::assemble(game, &progresses, &questions))
        .collect())
}

/// Pending or active game of the calling player.
pub async fn current_game(
    state: &SharedState,
    player_id: Uuid,
) -> Result<GameSessionView, ServiceError> {
    let store = state.require_store().await?;
    let game = store
        .find_unfinished_game_for_player(player_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("no pending or active game".into()))?;

    view_of(store.as_ref(), game).await
}

/// Any game the calling player takes part in. Identifiers that are not UUIDs are unknown games.
pub async fn game_by_id(
    state: &SharedState,
    raw_id: &str,
    player_id: Uuid,
) -> Result<GameSessionView, ServiceError> {
    let not_found = || ServiceError::NotFound(format!("game {raw_id}"));
    let game_id = Uuid::parse_str(raw_id).map_err(|_| not_found())?;

    let store = state.require_store().await?;
    let game = store.find_game(game_id).await?.ok_or_else(not_found)?;
    if !game.is_participant(player_id) {
        return Err(ServiceError::Forbidden(ForbiddenReason::NotParticipant));
    }

    view_of(store.as_ref(), game).await
}

/// Games of the calling player, newest first.
pub async fn my_games(
    state: &SharedState,
    player_id: Uuid,
    query: MyGamesQuery,
) -> Result<PaginatedGamesResponse, ServiceError> {
    let store = state.require_store().await?;
    let page = store
        .page_games_for_player(player_id, query.skip(), query.page_size())
        .await?;
    let items = views_of(store.as_ref(), page.items).await?;

    Ok(PaginatedGamesResponse::new(&query, page.total, items))
}

/// Aggregated results of the calling player's finished games.
pub async fn my_statistic(
    state: &SharedState,
    player_id: Uuid,
) -> Result<StatisticView, ServiceError> {
    let store = state.require_store().await?;
    let games = store.find_finished_games_for_player(player_id).await?;
    let progresses = if games.is_empty() {
        Vec::new()
    } else {
        store
            .find_progresses(games.iter().map(|game| game.id).collect())
            .await?
    };

    Ok(statistic_of(player_id, &games, &progresses))
}

/// Tally scores and outcomes of `player_id` over `games`.
pub fn statistic_of(
    player_id: Uuid,
    games: &[GameSessionEntity],
    progresses: &[PlayerProgressEntity],
) -> StatisticView {
    let score_of = |game_id: Uuid, player: Uuid| {
        progresses
            .iter()
            .find(|progress| progress.game_id == game_id && progress.player_id == player)
            .map_or(0, |progress| u64::from(progress.score))
    };

    let mut statistic = StatisticView {
        sum_score: 0,
        avg_scores: 0.0,
        games_count: 0,
        wins_count: 0,
        losses_count: 0,
        draws_count: 0,
    };

    for game in games {
        let Some(opponent) = game.opponent_of(player_id) else {
            continue;
        };
        let mine = score_of(game.id, player_id);
        let theirs = score_of(game.id, opponent);

        statistic.games_count += 1;
        statistic.sum_score += mine;
        match mine.cmp(&theirs) {
            std::cmp::Ordering::Greater => statistic.wins_count += 1,
            std::cmp::Ordering::Less => statistic.losses_count += 1,
            std::cmp::Ordering::Equal => statistic.draws_count += 1,
        }
    }

    if statistic.games_count > 0 {
        let average = statistic.sum_score as f64 / statistic.games_count as f64;
        statistic.avg_scores = (average * 100.0).round() / 100.0;
    }

    statistic
}
