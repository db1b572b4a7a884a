//! Runner owning the lifecycle of a unit of work: begin, timeout, commit or rollback, retry.

use futures::future::BoxFuture;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    config::TransactionPolicy,
    dao::quiz_store::{QuizStore, UnitOfWork},
    error::ServiceError,
};

/// Run `work` inside a fresh unit of work and commit it.
///
/// `work` may be invoked several times: every storage write conflict, raised by the work itself
/// or by the commit, discards the attempt and replays it on a new unit of work until
/// `policy.max_attempts` is reached. Any other error rolls the unit of work back and is returned
/// unchanged. An attempt exceeding `policy.timeout` is rolled back and fails with
/// [`ServiceError::Timeout`].
pub async fn run<S, T, F>(
    store: &S,
    policy: TransactionPolicy,
    operation: &'static str,
    mut work: F,
) -> Result<T, ServiceError>
where
    S: QuizStore + ?Sized,
    F: for<'u> FnMut(&'u mut dyn UnitOfWork) -> BoxFuture<'u, Result<T, ServiceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let mut uow = store.begin().await?;

        let outcome = match timeout(policy.timeout, work(uow.as_mut())).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(operation, attempt, "unit of work timed out; rolling back");
                rollback(uow, operation).await;
                return Err(ServiceError::Timeout);
            }
        };

        let conflict = match outcome {
            Ok(value) => match uow.commit().await {
                Ok(()) => return Ok(value),
                Err(err) if err.is_conflict() => err,
                Err(err) => return Err(err.into()),
            },
            Err(ServiceError::Unavailable(err)) if err.is_conflict() => {
                rollback(uow, operation).await;
                err
            }
            Err(err) => {
                rollback(uow, operation).await;
                return Err(err);
            }
        };

        if attempt >= max_attempts {
            warn!(operation, attempt, error = %conflict, "giving up after repeated write conflicts");
            return Err(conflict.into());
        }
        debug!(operation, attempt, error = %conflict, "write conflict; replaying unit of work");
    }
}

async fn rollback(uow: Box<dyn UnitOfWork>, operation: &'static str) {
    if let Err(err) = uow.rollback().await {
        warn!(operation, error = %err, "failed to roll back unit of work");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
        time::{Duration, SystemTime},
    };

    use uuid::Uuid;

    use super::*;
    use crate::dao::{
        models::GameSessionEntity, quiz_store::memory::MemoryQuizStore, storage::StorageError,
    };

    fn policy(max_attempts: u32) -> TransactionPolicy {
        TransactionPolicy {
            max_attempts,
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn conflicts_are_replayed_until_success() {
        let store = MemoryQuizStore::new();
        let calls = Arc::new(AtomicU32::new(0));
        let player = Uuid::new_v4();

        let counter = calls.clone();
        let game = run(&store, policy(3), "test", move |uow| {
            let counter = counter.clone();
            Box::pin(async move {
                let game = GameSessionEntity::pending(player, SystemTime::now());
                uow.save_game(game.clone()).await?;
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(StorageError::conflict("lost the race").into());
                }
                Ok(game)
            })
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let stored = store.find_unfinished_game_for_player(player).await.unwrap();
        assert_eq!(stored.map(|stored| stored.id), Some(game.id));
    }

    #[tokio::test]
    async fn conflicts_stop_after_max_attempts() {
        let store = MemoryQuizStore::new();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: Result<(), ServiceError> = run(&store, policy(2), "test", move |_uow| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::conflict("always").into())
            })
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Unavailable(err)) if err.is_conflict()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn business_errors_roll_back_without_retry() {
        let store = MemoryQuizStore::new();
        let player = Uuid::new_v4();

        let result: Result<(), ServiceError> = run(&store, policy(5), "test", move |uow| {
            Box::pin(async move {
                uow.save_game(GameSessionEntity::pending(player, SystemTime::now()))
                    .await?;
                Err(ServiceError::InvalidState("nope".into()))
            })
        })
        .await;

        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
        let stored = store.find_unfinished_game_for_player(player).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn slow_work_times_out_and_rolls_back() {
        let store = MemoryQuizStore::new();
        let player = Uuid::new_v4();
        let policy = TransactionPolicy {
            max_attempts: 1,
            timeout: Duration::from_millis(20),
        };

        let result: Result<(), ServiceError> = run(&store, policy, "test", move |uow| {
            Box::pin(async move {
                uow.save_game(GameSessionEntity::pending(player, SystemTime::now()))
                    .await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Timeout)));
        let stored = store.find_unfinished_game_for_player(player).await.unwrap();
        assert!(stored.is_none());
    }
}
