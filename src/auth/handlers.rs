use axum::{extract::State, http::StatusCode, routing::post, Router};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    app::method_not_allowed,
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        extractors::JsonBody,
        password::{hash_password_blocking, verify_password_blocking},
        validate::validate_user,
    },
    error::{AppError, AppResult, AuthError},
    response::{reply, Reply},
    state::AppState,
    users::repo_types::{NewUser, User},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register).fallback(method_not_allowed))
        .route("/auth/login", post(login).fallback(method_not_allowed))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(mut payload): JsonBody<RegisterRequest>,
) -> AppResult<Reply<User>> {
    payload.email = normalize_email(&payload.email);
    payload.name = payload.name.trim().to_string();

    if let Err(e) = validate_user(&payload, true) {
        warn!(error = %e, "registration rejected");
        return Err(e);
    }

    let password_hash = hash_password_blocking(payload.password).await?;
    let new_user = NewUser {
        name: payload.name,
        email: payload.email,
        password_hash,
        phone: payload.phone,
        address: payload.address,
    };

    let user = match User::create(&state.db, &new_user).await {
        Ok(u) => u,
        Err(AppError::DuplicateEmail) => {
            warn!(email = %new_user.email, "email already registered");
            return Err(AppError::DuplicateEmail);
        }
        Err(e) => return Err(e),
    };

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(reply(
        StatusCode::CREATED,
        "User registered successfully",
        Some(user),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Reply<LoginResponse>> {
    let candidate = RegisterRequest {
        email: normalize_email(&payload.email),
        password: payload.password,
        ..Default::default()
    };

    if let Err(e) = validate_user(&candidate, false) {
        warn!(error = %e, "login rejected");
        return Err(e);
    }

    let user = match User::find_by_email(&state.db, &candidate.email, true).await {
        Ok(u) => u,
        Err(AppError::NotFound(_)) => {
            warn!(email = %candidate.email, "login unknown email");
            return Err(AuthError::BadCredentials.into());
        }
        Err(e) => return Err(e),
    };

    let hash = user.password_hash.clone().unwrap_or_default();
    if !verify_password_blocking(candidate.password, hash).await {
        warn!(user_id = user.id, "login invalid password");
        return Err(AuthError::BadCredentials.into());
    }

    let token = state.keys.issue(user.id, OffsetDateTime::now_utc())?;

    info!(user_id = user.id, "user logged in");
    Ok(reply(
        StatusCode::OK,
        "User logged in successfully",
        Some(LoginResponse {
            token,
            token_type: "Bearer",
            expires_in: state.keys.ttl().whole_seconds(),
            user: PublicUser {
                id: user.id,
                name: user.name,
                email: user.email,
            },
        }),
    ))
}
