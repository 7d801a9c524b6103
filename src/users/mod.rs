pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod update;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
