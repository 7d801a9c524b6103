use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use tracing::{info, instrument, warn};

use crate::{
    app::method_not_allowed,
    auth::{
        extractors::{AuthUser, JsonBody},
        password::hash_password_blocking,
        validate::validate_changes,
    },
    error::{AppError, AppResult},
    response::{reply, Reply},
    state::AppState,
    users::{
        dto::{EmailQuery, UpdateUserRequest},
        repo_types::User,
        update::UserChanges,
    },
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).fallback(method_not_allowed))
        .route(
            "/users/details",
            get(get_user_by_email).fallback(method_not_allowed),
        )
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route(
        "/users/:id",
        axum::routing::put(update_user)
            .patch(update_user)
            .delete(delete_user)
            .fallback(method_not_allowed),
    )
}

fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::validation("Invalid user ID"))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Reply<Vec<User>>> {
    let users = User::list_all(&state.db).await?;
    info!(count = users.len(), "users listed");
    Ok(reply(StatusCode::OK, "Users fetched successfully", Some(users)))
}

#[instrument(skip(state, query))]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> AppResult<Reply<User>> {
    let Query(query) = query.map_err(|_| AppError::validation("Invalid query string"))?;
    let email = query
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::validation("email is required"))?;

    let user = match User::find_by_email(&state.db, &email, false).await {
        Ok(u) => u,
        Err(e @ AppError::NotFound(_)) => {
            warn!(caller, email = %email, "user lookup missed");
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    Ok(reply(StatusCode::OK, "User fetched successfully", Some(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(raw_id): Path<String>,
    JsonBody(mut payload): JsonBody<UpdateUserRequest>,
) -> AppResult<Reply<()>> {
    let id = parse_id(&raw_id)?;
    payload.email = payload.email.map(|e| e.trim().to_lowercase());

    if let Err(e) = validate_changes(&payload) {
        warn!(error = %e, user_id = id, "update rejected");
        return Err(e);
    }

    let password_hash = match payload.password {
        Some(p) => Some(hash_password_blocking(p).await?),
        None => None,
    };
    let changes = UserChanges {
        name: payload.name,
        email: payload.email,
        phone: payload.phone,
        address: payload.address,
        password_hash,
    };

    let affected = User::update_partial(&state.db, id, changes).await?;
    if affected == 0 {
        warn!(user_id = id, "no user to update");
        return Err(AppError::not_found("User"));
    }

    info!(caller, user_id = id, "user updated");
    Ok(reply(StatusCode::OK, "User updated successfully", None))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(raw_id): Path<String>,
) -> AppResult<Reply<()>> {
    let id = parse_id(&raw_id)?;
    let affected = User::delete_by_id(&state.db, id).await?;
    if affected == 0 {
        warn!(user_id = id, "no user to delete");
        return Err(AppError::not_found("User"));
    }

    info!(caller, user_id = id, "user deleted");
    Ok(reply(StatusCode::OK, "User deleted successfully", None))
}
