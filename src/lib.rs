//! Library crate for pair-quiz-back, exposing modules for binaries and integration tests.

/// Rules, transaction policy and fixtures loaded at startup.
pub mod config;
/// Entities and storage backends.
pub mod dao;
/// Wire types of the REST API.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP routes and extractors.
pub mod routes;
/// Business logic.
pub mod services;
/// Shared application state.
pub mod state;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the top-level router and attach cross-cutting middleware layers.
pub fn build_router(state: state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
