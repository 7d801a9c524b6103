use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::response::ApiResponse;

/// Reasons a protected route rejects its caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    Missing,
    #[error("Invalid token")]
    Invalid,
    #[error("Token expired")]
    Expired,
    #[error("Invalid email or password")]
    BadCredentials,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("No fields to update")]
    NoFieldsToUpdate,

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("encoding error: {0}")]
    Encoding(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        AppError::NotFound(entity.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::NoFieldsToUpdate => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Store(_) | AppError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller; internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Store(e) => {
                error!(error = %e, "store error");
                "A database error occurred".to_string()
            }
            AppError::Encoding(e) => {
                error!(error = %e, "encoding error");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()>::failure(self.user_message());
        (self.status(), Json(body)).into_response()
    }
}
