mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use common::test_app;
use pair_quiz_back::{build_router, routes::extract::PLAYER_ID_HEADER};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    player: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(player) = player {
        request = request.header(PLAYER_ID_HEADER, player.to_string());
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn connection_lifecycle_over_http() {
    let app = test_app(8, 2).await;
    let router = build_router(app.state.clone());
    let (alice, bob) = (app.player(0), app.player(1));

    let (status, body) = send(
        &router,
        Method::POST,
        "/pair-game-quiz/pairs/connection",
        Some(alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PendingSecondPlayer");
    assert!(body["questions"].is_null());
    assert!(body["second_player_progress"].is_null());

    let (status, _) = send(
        &router,
        Method::POST,
        "/pair-game-quiz/pairs/connection",
        Some(alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &router,
        Method::POST,
        "/pair-game-quiz/pairs/connection",
        Some(bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Active");
    assert_eq!(body["questions"].as_array().map(Vec::len), Some(5));

    let question_id = body["questions"][0]["id"].as_str().unwrap().to_owned();
    let answer = app.answers[&Uuid::parse_str(&question_id).unwrap()].clone();
    let (status, body) = send(
        &router,
        Method::POST,
        "/pair-game-quiz/pairs/my-current/answers",
        Some(alice),
        Some(json!({ "answer": answer })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question_id"], question_id.as_str());
    assert_eq!(body["answer_status"], "Correct");

    let (status, body) = send(
        &router,
        Method::GET,
        "/pair-game-quiz/pairs/my-current",
        Some(bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Active");

    let (status, body) = send(
        &router,
        Method::GET,
        "/pair-game-quiz/users/my-statistic",
        Some(alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["games_count"], 0);
}

#[tokio::test]
async fn missing_or_malformed_player_header_is_unauthorized() {
    let app = test_app(8, 1).await;
    let router = build_router(app.state.clone());

    let (status, body) = send(
        &router,
        Method::POST,
        "/pair-game-quiz/pairs/connection",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/pair-game-quiz/pairs/my-current")
        .header(PLAYER_ID_HEADER, "nobody")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_or_malformed_game_id_is_not_found() {
    let app = test_app(8, 1).await;
    let router = build_router(app.state.clone());
    let alice = app.player(0);

    let (status, _) = send(
        &router,
        Method::GET,
        "/pair-game-quiz/pairs/not-a-uuid",
        Some(alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/pair-game-quiz/pairs/{}", Uuid::new_v4());
    let (status, _) = send(&router, Method::GET, &uri, Some(alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &router,
        Method::GET,
        "/pair-game-quiz/pairs/my-current",
        Some(alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn answering_without_active_game_is_forbidden() {
    let app = test_app(8, 1).await;
    let router = build_router(app.state.clone());

    let (status, _) = send(
        &router,
        Method::POST,
        "/pair-game-quiz/pairs/my-current/answers",
        Some(app.player(0)),
        Some(json!({ "answer": "anything" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn history_page_size_is_validated() {
    let app = test_app(8, 1).await;
    let router = build_router(app.state.clone());
    let alice = app.player(0);

    let (status, _) = send(
        &router,
        Method::GET,
        "/pair-game-quiz/pairs/my?page_size=100",
        Some(alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &router,
        Method::GET,
        "/pair-game-quiz/pairs/my?page_number=1&page_size=20",
        Some(alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page_size"], 20);
    assert_eq!(body["total_count"], 0);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn healthcheck_reports_store_state() {
    let app = test_app(5, 0).await;
    let router = build_router(app.state.clone());

    let (status, body) = send(&router, Method::GET, "/healthcheck", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["degraded"], false);
}

#[tokio::test]
async fn malformed_answer_body_is_a_json_bad_request() {
    let app = test_app(8, 2).await;
    let router = build_router(app.state.clone());
    let (alice, bob) = (app.player(0), app.player(1));
    app.connect(alice).await.unwrap();
    app.connect(bob).await.unwrap();

    for body in [json!({ "text": "x" }), json!({ "answer": "x", "position": -1 })] {
        let (status, body) = send(
            &router,
            Method::POST,
            "/pair-game-quiz/pairs/my-current/answers",
            Some(alice),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/pair-game-quiz/pairs/my-current/answers")
        .header(PLAYER_ID_HEADER, alice.to_string())
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["message"].is_string());

    let view = app.current(alice).await.unwrap();
    assert!(common::progress_of(&view, alice).unwrap().answers.is_empty());
}

#[tokio::test]
async fn malformed_history_query_is_a_json_bad_request() {
    let app = test_app(8, 1).await;
    let router = build_router(app.state.clone());

    let (status, body) = send(
        &router,
        Method::GET,
        "/pair-game-quiz/pairs/my?page_size=many",
        Some(app.player(0)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}
