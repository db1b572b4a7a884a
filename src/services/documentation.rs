use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Pair Quiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::pair_game::connect,
        crate::routes::pair_game::submit_answer,
        crate::routes::pair_game::my_current,
        crate::routes::pair_game::game_by_id,
        crate::routes::pair_game::my_games,
        crate::routes::pair_game::my_statistic,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::GameSessionView,
            crate::dto::game::PlayerProgressView,
            crate::dto::game::PlayerView,
            crate::dto::game::AnswerView,
            crate::dto::game::QuestionView,
            crate::dto::game::GameStatusDto,
            crate::dto::game::AnswerStatusDto,
            crate::dto::game::SubmitAnswerRequest,
            crate::dto::game::PaginatedGamesResponse,
            crate::dto::game::StatisticView,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "pair-game-quiz", description = "Pair quiz matchmaking, answers and history"),
    )
)]
/// OpenAPI document of every public route.
pub struct ApiDoc;
