use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::error::{AppError, AppResult};

/// Hashes `plain` into an argon2 PHC string with a fresh random salt.
pub fn hash_password(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            AppError::Encoding(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Returns true iff `plain` matches `hash`. A hash that fails to parse is a mismatch.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "argon2 parse hash error");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

/// Runs [`hash_password`] on the blocking pool; argon2 is CPU bound.
pub async fn hash_password_blocking(plain: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Encoding(e.to_string()))?
}

/// Runs [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(plain: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .unwrap_or(false)
}
