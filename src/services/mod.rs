/// OpenAPI documentation generation.
pub mod documentation;
/// Answer grading.
pub mod grader;
/// Health check service.
pub mod health_service;
/// Join-or-create pairing.
pub mod matchmaker;
/// Read-side projections of pair games.
pub mod query_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Answer submission and game completion.
pub mod turn_engine;
/// Unit-of-work runner with timeout and conflict retry.
pub mod unit_of_work;
