use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Header carrying the identifier of the calling player, set by the authenticating gateway.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Identifier of the player on whose behalf the request runs.
#[derive(Debug, Clone, Copy)]
pub struct CurrentPlayer(pub Uuid);

impl<S> FromRequestParts<S> for CurrentPlayer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(PLAYER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing X-Player-Id header".into()))?;

        value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(CurrentPlayer)
            .ok_or_else(|| AppError::Unauthorized("X-Player-Id must be a UUID".into()))
    }
}

/// JSON body that was deserialized and validated. Every failure is a 400 [`AppError`].
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Query string that was deserialized and validated. Every failure is a 400 [`AppError`].
#[derive(Debug, Clone)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(ValidQuery(value))
    }
}
