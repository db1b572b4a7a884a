use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::game::{
        AnswerResultResponse, AnswerView, GameSessionView, MyGamesQuery, PaginatedGamesResponse,
        StatisticView, SubmitAnswerRequest,
    },
    error::AppError,
    routes::extract::{CurrentPlayer, ValidJson, ValidQuery},
    services::{matchmaker, query_service, turn_engine},
    state::SharedState,
};

/// Routes of the pair quiz game.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/pair-game-quiz/pairs/connection", post(connect))
        .route("/pair-game-quiz/pairs/my-current/answers", post(submit_answer))
        .route("/pair-game-quiz/pairs/my-current", get(my_current))
        .route("/pair-game-quiz/pairs/my", get(my_games))
        .route("/pair-game-quiz/pairs/{id}", get(game_by_id))
        .route("/pair-game-quiz/users/my-statistic", get(my_statistic))
}

/// Join the oldest open game of another player, or open a new one.
#[utoipa::path(
    post,
    path = "/pair-game-quiz/pairs/connection",
    tag = "pair-game-quiz",
    params(("X-Player-Id" = String, Header, description = "Calling player")),
    responses(
        (status = 200, description = "Joined or created game", body = GameSessionView),
        (status = 401, description = "Missing or malformed player header"),
        (status = 403, description = "Player already participates in a game"),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn connect(
    State(state): State<SharedState>,
    CurrentPlayer(player_id): CurrentPlayer,
) -> Result<Json<GameSessionView>, AppError> {
    let view = matchmaker::connect(&state, player_id).await?;
    Ok(Json(view))
}

/// Answer the next question of the current game.
#[utoipa::path(
    post,
    path = "/pair-game-quiz/pairs/my-current/answers",
    tag = "pair-game-quiz",
    params(("X-Player-Id" = String, Header, description = "Calling player")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = AnswerView),
        (status = 400, description = "Invalid body"),
        (status = 403, description = "No active game or every question already answered"),
        (status = 409, description = "Stale answer position")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    CurrentPlayer(player_id): CurrentPlayer,
    ValidJson(payload): ValidJson<SubmitAnswerRequest>,
) -> Result<Json<AnswerResultResponse>, AppError> {
    let result = turn_engine::answer(&state, player_id, payload).await?;
    Ok(Json(result))
}

/// Pending or active game of the caller.
#[utoipa::path(
    get,
    path = "/pair-game-quiz/pairs/my-current",
    tag = "pair-game-quiz",
    params(("X-Player-Id" = String, Header, description = "Calling player")),
    responses(
        (status = 200, description = "Current game", body = GameSessionView),
        (status = 404, description = "No pending or active game")
    )
)]
pub async fn my_current(
    State(state): State<SharedState>,
    CurrentPlayer(player_id): CurrentPlayer,
) -> Result<Json<GameSessionView>, AppError> {
    let view = query_service::current_game(&state, player_id).await?;
    Ok(Json(view))
}

/// Any game the caller takes part in.
#[utoipa::path(
    get,
    path = "/pair-game-quiz/pairs/{id}",
    tag = "pair-game-quiz",
    params(
        ("id" = String, Path, description = "Identifier of the game"),
        ("X-Player-Id" = String, Header, description = "Calling player")
    ),
    responses(
        (status = 200, description = "Game", body = GameSessionView),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn game_by_id(
    State(state): State<SharedState>,
    CurrentPlayer(player_id): CurrentPlayer,
    Path(id): Path<String>,
) -> Result<Json<GameSessionView>, AppError> {
    let view = query_service::game_by_id(&state, &id, player_id).await?;
    Ok(Json(view))
}

/// Game history of the caller, newest first.
#[utoipa::path(
    get,
    path = "/pair-game-quiz/pairs/my",
    tag = "pair-game-quiz",
    params(
        MyGamesQuery,
        ("X-Player-Id" = String, Header, description = "Calling player")
    ),
    responses(
        (status = 200, description = "Page of games", body = PaginatedGamesResponse),
        (status = 400, description = "Invalid paging parameters")
    )
)]
pub async fn my_games(
    State(state): State<SharedState>,
    CurrentPlayer(player_id): CurrentPlayer,
    ValidQuery(query): ValidQuery<MyGamesQuery>,
) -> Result<Json<PaginatedGamesResponse>, AppError> {
    let page = query_service::my_games(&state, player_id, query).await?;
    Ok(Json(page))
}

/// Aggregated results of the caller's finished games.
#[utoipa::path(
    get,
    path = "/pair-game-quiz/users/my-statistic",
    tag = "pair-game-quiz",
    params(("X-Player-Id" = String, Header, description = "Calling player")),
    responses((status = 200, description = "Statistic", body = StatisticView))
)]
pub async fn my_statistic(
    State(state): State<SharedState>,
    CurrentPlayer(player_id): CurrentPlayer,
) -> Result<Json<StatisticView>, AppError> {
    let statistic = query_service::my_statistic(&state, player_id).await?;
    Ok(Json(statistic))
}
