use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether quiz operations can currently reach storage, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "quiz storage health check failed");
            }
        }
        None => warn!("quiz storage unavailable (degraded mode)"),
    }

    if state.is_degraded() {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
