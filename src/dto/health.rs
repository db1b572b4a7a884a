use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Whether quiz operations are currently rejected for lack of storage.
    pub degraded: bool,
}

impl HealthResponse {
    /// Storage reachable.
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
            degraded: false,
        }
    }

    /// Storage unreachable, quiz operations rejected.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".into(),
            degraded: true,
        }
    }
}
