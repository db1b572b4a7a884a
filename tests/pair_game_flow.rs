mod common;

use std::{collections::HashSet, sync::Arc};

use common::{QUESTIONS_PER_GAME, progress_of, test_app};
use pair_quiz_back::{
    config::AppConfig,
    dao::quiz_store::memory::MemoryQuizStore,
    dto::game::{AnswerStatusDto, GameStatusDto, MyGamesQuery, SubmitAnswerRequest},
    error::{ForbiddenReason, ServiceError},
    services::{matchmaker, query_service, turn_engine},
    state::AppState,
};
use uuid::Uuid;

fn is_forbidden(result: &Result<impl std::fmt::Debug, ServiceError>, reason: ForbiddenReason) -> bool {
    matches!(result, Err(ServiceError::Forbidden(actual)) if *actual == reason)
}

#[tokio::test]
async fn first_player_waits_in_pending_game() {
    let app = test_app(8, 2).await;
    let alice = app.player(0);

    let view = app.connect(alice).await.unwrap();

    assert_eq!(view.status, GameStatusDto::PendingSecondPlayer);
    assert!(view.questions.is_none());
    assert!(view.second_player_progress.is_none());
    assert!(view.start_game_date.is_none());
    assert_eq!(view.first_player_progress.player.login, "player0");
    assert_eq!(view.first_player_progress.score, 0);
}

#[tokio::test]
async fn second_player_activates_game_with_distinct_published_questions() {
    let app = test_app(8, 2).await;
    let (alice, bob) = (app.player(0), app.player(1));

    let pending = app.connect(alice).await.unwrap();
    let active = app.connect(bob).await.unwrap();

    assert_eq!(active.id, pending.id);
    assert_eq!(active.status, GameStatusDto::Active);
    assert!(active.start_game_date.is_some());

    let questions = active.questions.unwrap();
    assert_eq!(questions.len(), QUESTIONS_PER_GAME);
    let distinct: HashSet<Uuid> = questions.iter().map(|question| question.id).collect();
    assert_eq!(distinct.len(), QUESTIONS_PER_GAME);
    assert!(distinct.iter().all(|id| app.answers.contains_key(id)));

    let second = active.second_player_progress.unwrap();
    assert_eq!(second.player.id, bob);
    assert_eq!(second.score, 0);
}

#[tokio::test]
async fn perfect_player_beats_zero_player_with_finish_bonus() {
    let app = test_app(8, 2).await;
    let (alice, bob) = (app.player(0), app.player(1));
    app.connect(alice).await.unwrap();
    let game_id = app.connect(bob).await.unwrap().id;

    for _ in 0..QUESTIONS_PER_GAME {
        let result = app.answer_next(alice, true).await.unwrap();
        assert_eq!(result.answer_status, AnswerStatusDto::Correct);
    }
    for _ in 0..QUESTIONS_PER_GAME {
        let result = app.answer_next(bob, false).await.unwrap();
        assert_eq!(result.answer_status, AnswerStatusDto::Incorrect);
    }

    let view = query_service::game_by_id(&app.state, &game_id.to_string(), alice)
        .await
        .unwrap();
    assert_eq!(view.status, GameStatusDto::Finished);
    assert!(view.finish_game_date.is_some());
    assert_eq!(progress_of(&view, alice).unwrap().score, 6);
    assert_eq!(progress_of(&view, bob).unwrap().score, 0);

    let questions: Vec<Uuid> = view
        .questions
        .as_ref()
        .unwrap()
        .iter()
        .map(|question| question.id)
        .collect();
    for player in [alice, bob] {
        let answered: Vec<Uuid> = progress_of(&view, player)
            .unwrap()
            .answers
            .iter()
            .map(|answer| answer.question_id)
            .collect();
        assert_eq!(answered, questions);
    }

    assert!(matches!(app.current(alice).await, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn first_finisher_bonus_is_applied_once() {
    let app = test_app(8, 2).await;
    let (alice, bob) = (app.player(0), app.player(1));
    app.connect(alice).await.unwrap();
    let game_id = app.connect(bob).await.unwrap().id;

    // Turns alternate; Alice submits first in every round and so completes first.
    let alice_turns = [true, true, true, false, false];
    let bob_turns = [true, false, false, false, false];
    for (alice_correct, bob_correct) in alice_turns.into_iter().zip(bob_turns) {
        app.answer_next(alice, alice_correct).await.unwrap();
        app.answer_next(bob, bob_correct).await.unwrap();
    }

    let view = query_service::game_by_id(&app.state, &game_id.to_string(), bob)
        .await
        .unwrap();
    assert_eq!(view.status, GameStatusDto::Finished);
    assert_eq!(progress_of(&view, alice).unwrap().score, 4);
    assert_eq!(progress_of(&view, bob).unwrap().score, 1);
}

#[tokio::test]
async fn zero_score_first_finisher_gets_no_bonus() {
    let app = test_app(8, 2).await;
    let (alice, bob) = (app.player(0), app.player(1));
    app.connect(alice).await.unwrap();
    let game_id = app.connect(bob).await.unwrap().id;

    for _ in 0..QUESTIONS_PER_GAME {
        app.answer_next(alice, false).await.unwrap();
    }
    for _ in 0..QUESTIONS_PER_GAME {
        app.answer_next(bob, true).await.unwrap();
    }

    let view = query_service::game_by_id(&app.state, &game_id.to_string(), alice)
        .await
        .unwrap();
    assert_eq!(progress_of(&view, alice).unwrap().score, 0);
    assert_eq!(progress_of(&view, bob).unwrap().score, 5);
}

#[tokio::test]
async fn player_in_game_cannot_join_again() {
    let app = test_app(8, 2).await;
    let (alice, bob) = (app.player(0), app.player(1));

    app.connect(alice).await.unwrap();
    assert!(is_forbidden(
        &app.connect(alice).await,
        ForbiddenReason::AlreadyInGame
    ));

    app.connect(bob).await.unwrap();
    assert!(is_forbidden(
        &app.connect(alice).await,
        ForbiddenReason::AlreadyInGame
    ));
    assert!(is_forbidden(
        &app.connect(bob).await,
        ForbiddenReason::AlreadyInGame
    ));
}

#[tokio::test]
async fn finished_players_can_join_a_new_game() {
    let app = test_app(8, 2).await;
    let (alice, bob) = (app.player(0), app.player(1));
    let first_game = app.connect(alice).await.unwrap().id;
    app.connect(bob).await.unwrap();
    for _ in 0..QUESTIONS_PER_GAME {
        app.answer_next(alice, true).await.unwrap();
        app.answer_next(bob, true).await.unwrap();
    }

    let next = app.connect(bob).await.unwrap();
    assert_ne!(next.id, first_game);
    assert_eq!(next.status, GameStatusDto::PendingSecondPlayer);
}

#[tokio::test]
async fn answers_beyond_quota_are_rejected_without_mutation() {
    let app = test_app(8, 2).await;
    let (alice, bob) = (app.player(0), app.player(1));
    app.connect(alice).await.unwrap();
    app.connect(bob).await.unwrap();

    for _ in 0..QUESTIONS_PER_GAME {
        app.answer_next(alice, true).await.unwrap();
    }
    let before = app.current(alice).await.unwrap();

    let extra = app.answer_next(alice, true).await;
    assert!(is_forbidden(&extra, ForbiddenReason::AnswersExhausted));

    let after = app.current(alice).await.unwrap();
    assert_eq!(after.status, GameStatusDto::Active);
    let (before, after) = (
        progress_of(&before, alice).unwrap(),
        progress_of(&after, alice).unwrap(),
    );
    assert_eq!(after.answers.len(), QUESTIONS_PER_GAME);
    assert_eq!(after.score, before.score);
}

#[tokio::test]
async fn answering_requires_an_active_game() {
    let app = test_app(8, 2).await;
    let alice = app.player(0);

    let without_game = app.answer_next(alice, true).await;
    assert!(is_forbidden(&without_game, ForbiddenReason::NotInGame));

    app.connect(alice).await.unwrap();
    let while_pending = app.answer_next(alice, true).await;
    assert!(is_forbidden(&while_pending, ForbiddenReason::NotInGame));
}

#[tokio::test]
async fn stale_position_is_rejected_without_mutation() {
    let app = test_app(8, 2).await;
    let (alice, bob) = (app.player(0), app.player(1));
    app.connect(alice).await.unwrap();
    app.connect(bob).await.unwrap();

    let submit = |position| {
        turn_engine::answer(
            &app.state,
            alice,
            SubmitAnswerRequest {
                answer: "whatever".into(),
                position: Some(position),
            },
        )
    };

    submit(0).await.unwrap();
    let retry = submit(0).await;
    assert!(matches!(retry, Err(ServiceError::InvalidState(_))));

    let view = app.current(alice).await.unwrap();
    assert_eq!(progress_of(&view, alice).unwrap().answers.len(), 1);

    submit(1).await.unwrap();
}

#[tokio::test]
async fn insufficient_questions_leave_no_state_behind() {
    let app = test_app(3, 2).await;
    let (alice, bob) = (app.player(0), app.player(1));
    let pending = app.connect(alice).await.unwrap();

    let joined = app.connect(bob).await;
    assert!(matches!(
        joined,
        Err(ServiceError::InsufficientQuestions {
            required: QUESTIONS_PER_GAME,
            available: 3
        })
    ));

    assert!(matches!(app.current(bob).await, Err(ServiceError::NotFound(_))));
    let still_pending = app.current(alice).await.unwrap();
    assert_eq!(still_pending.id, pending.id);
    assert_eq!(still_pending.status, GameStatusDto::PendingSecondPlayer);
}

#[tokio::test]
async fn unknown_player_cannot_connect() {
    let app = test_app(8, 0).await;
    let result = app.connect(Uuid::new_v4()).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn degraded_mode_rejects_quiz_operations() {
    let state = AppState::new(AppConfig::default());
    let result = matchmaker::connect(&state, Uuid::new_v4()).await;
    assert!(matches!(result, Err(ServiceError::Degraded)));

    state.install_store(Arc::new(MemoryQuizStore::new())).await;
    let result = query_service::current_game(&state, Uuid::new_v4()).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn game_visibility_is_restricted_to_participants() {
    let app = test_app(8, 3).await;
    let (alice, bob, carol) = (app.player(0), app.player(1), app.player(2));
    let game_id = app.connect(alice).await.unwrap().id.to_string();
    app.connect(bob).await.unwrap();

    for participant in [alice, bob] {
        let view = query_service::game_by_id(&app.state, &game_id, participant)
            .await
            .unwrap();
        assert_eq!(view.id.to_string(), game_id);
    }

    let outsider = query_service::game_by_id(&app.state, &game_id, carol).await;
    assert!(is_forbidden(&outsider, ForbiddenReason::NotParticipant));

    let unknown =
        query_service::game_by_id(&app.state, &Uuid::new_v4().to_string(), alice).await;
    assert!(matches!(unknown, Err(ServiceError::NotFound(_))));

    let malformed = query_service::game_by_id(&app.state, "not-a-uuid", alice).await;
    assert!(matches!(malformed, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn history_and_statistic_cover_finished_games() {
    let app = test_app(8, 3).await;
    let (alice, bob, carol) = (app.player(0), app.player(1), app.player(2));

    app.connect(alice).await.unwrap();
    app.connect(bob).await.unwrap();
    for _ in 0..QUESTIONS_PER_GAME {
        app.answer_next(alice, true).await.unwrap();
    }
    for _ in 0..QUESTIONS_PER_GAME {
        app.answer_next(bob, false).await.unwrap();
    }

    let newest = app.connect(alice).await.unwrap();
    app.connect(carol).await.unwrap();

    let page = query_service::my_games(&app.state, alice, MyGamesQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.pages_count, 1);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id, newest.id);
    assert_eq!(page.items[1].status, GameStatusDto::Finished);

    let second_page = query_service::my_games(
        &app.state,
        alice,
        MyGamesQuery {
            page_number: Some(2),
            page_size: Some(1),
        },
    )
    .await
    .unwrap();
    assert_eq!(second_page.pages_count, 2);
    assert_eq!(second_page.items.len(), 1);
    assert_eq!(second_page.items[0].status, GameStatusDto::Finished);

    let alice_stats = query_service::my_statistic(&app.state, alice).await.unwrap();
    assert_eq!(alice_stats.games_count, 1);
    assert_eq!(alice_stats.sum_score, 6);
    assert_eq!(alice_stats.avg_scores, 6.0);
    assert_eq!(alice_stats.wins_count, 1);

    let bob_stats = query_service::my_statistic(&app.state, bob).await.unwrap();
    assert_eq!(bob_stats.losses_count, 1);
    assert_eq!(bob_stats.sum_score, 0);

    let carol_stats = query_service::my_statistic(&app.state, carol).await.unwrap();
    assert_eq!(carol_stats.games_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joiners_activate_a_pending_game_once() {
    for joiners in 2..=10 {
        let app = Arc::new(test_app(8, joiners + 1).await);
        let creator = app.player(0);
        let pending = app.connect(creator).await.unwrap();

        let handles: Vec<_> = (1..=joiners)
            .map(|index| {
                let app = app.clone();
                tokio::spawn(async move {
                    let player = app.player(index);
                    app.connect(player).await.map(|view| (player, view))
                })
            })
            .collect();

        let mut attached = 0;
        for handle in handles {
            let (player, view) = handle.await.unwrap().unwrap();
            if view.id == pending.id {
                attached += 1;
                assert_eq!(view.status, GameStatusDto::Active);
            }
            let current = app.current(player).await.unwrap();
            assert_eq!(current.id, view.id);
        }
        assert_eq!(attached, 1, "{joiners} joiners");

        let active = app.current(creator).await.unwrap();
        assert_eq!(active.status, GameStatusDto::Active);
        assert_eq!(active.questions.unwrap().len(), QUESTIONS_PER_GAME);

        for index in 1..=joiners {
            let view = app.current(app.player(index)).await.unwrap();
            match view.status {
                GameStatusDto::Active => {
                    assert_eq!(view.questions.unwrap().len(), QUESTIONS_PER_GAME)
                }
                GameStatusDto::PendingSecondPlayer => assert!(view.questions.is_none()),
                GameStatusDto::Finished => panic!("no game can be finished yet"),
            }
        }
    }
}
