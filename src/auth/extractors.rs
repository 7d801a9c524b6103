use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::error::{AppError, AuthError};

/// Extracts and validates the bearer token, returning the user ID.
pub struct AuthUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::Missing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(AuthError::Invalid)?;

        match keys.verify(token.trim(), OffsetDateTime::now_utc()) {
            Ok(user_id) => Ok(AuthUser(user_id)),
            Err(e) => {
                warn!(error = %e, "rejected bearer token");
                Err(AppError::Auth(e.into()))
            }
        }
    }
}

/// `Json` whose rejection is rendered in the shared envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                warn!(error = %rejection.body_text(), "invalid request body");
                Err(match rejection {
                    JsonRejection::MissingJsonContentType(_) => {
                        AppError::validation("Expected Content-Type: application/json")
                    }
                    _ => AppError::validation("Invalid request body"),
                })
            }
        }
    }
}
