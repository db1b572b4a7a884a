//! Pair Quiz Back binary entrypoint wiring the REST layer and the quiz store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use pair_quiz_back::{
    build_router,
    config::AppConfig,
    dao::quiz_store::memory::MemoryQuizStore,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the storage backend (`mongo` or `memory`).
const STORE_ENV: &str = "QUIZ_STORE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    start_store(app_state.clone()).await?;

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the storage backend named by [`STORE_ENV`].
async fn start_store(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var(STORE_ENV).unwrap_or_else(|_| default_backend().to_owned());

    match backend.as_str() {
        "memory" => {
            let fixtures = state.config().fixtures().clone();
            info!(
                questions = fixtures.questions.len(),
                players = fixtures.players.len(),
                "using in-memory quiz store"
            );
            let store = MemoryQuizStore::with_fixtures(fixtures.questions, fixtures.players).await;
            state.install_store(Arc::new(store)).await;
            Ok(())
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            info!("using MongoDB quiz store");
            tokio::spawn(pair_quiz_back::services::storage_supervisor::run(
                state,
                connect_mongo,
            ));
            Ok(())
        }
        other => anyhow::bail!("unsupported {STORE_ENV} value `{other}`"),
    }
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo()
-> Result<Arc<dyn pair_quiz_back::dao::quiz_store::QuizStore>, pair_quiz_back::dao::storage::StorageError>
{
    use pair_quiz_back::dao::quiz_store::mongodb::{MongoConfig, MongoQuizStore};

    let config = MongoConfig::from_env().await?;
    let store = MongoQuizStore::connect(config).await?;
    Ok(Arc::new(store))
}

fn default_backend() -> &'static str {
    if cfg!(feature = "mongo-store") {
        "mongo"
    } else {
        "memory"
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
