use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod validate;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
