/// Game lifecycle state machine.
pub mod lifecycle;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::{AppConfig, QuizRules, TransactionPolicy},
    dao::quiz_store::QuizStore,
    error::ServiceError,
};

/// Handle to the application state shared by every request.
pub type SharedState = Arc<AppState>;

/// Central application state holding the configuration and the storage handle.
pub struct AppState {
    store: RwLock<Option<Arc<dyn QuizStore>>>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            config,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current quiz store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the quiz store or fail with [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new quiz store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn QuizStore>) {
        self.set_store(store).await;
        self.update_degraded(false);
    }

    /// Replace the quiz store without touching the degraded flag.
    pub async fn set_store(&self, store: Arc<dyn QuizStore>) {
        let mut guard = self.store.write().await;
        *guard = Some(store);
    }

    /// Remove the current quiz store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shortcut to the configured quiz rules.
    pub fn rules(&self) -> &QuizRules {
        self.config.rules()
    }

    /// Shortcut to the configured unit-of-work policy.
    pub fn transaction_policy(&self) -> TransactionPolicy {
        self.config.transaction()
    }
}
