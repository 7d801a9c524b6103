use axum::{http::StatusCode, Json};
use serde::Serialize;

/// JSON envelope shared by every route: `{ status, message, data? }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status: true,
            message: message.into(),
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            data: None,
        }
    }
}

pub type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

pub fn reply<T: Serialize>(status: StatusCode, message: &str, data: Option<T>) -> Reply<T> {
    (status, Json(ApiResponse::success(message, data)))
}
