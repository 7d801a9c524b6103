use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Argon2 hash; only selected on the login path and never serialized.
    #[serde(skip_serializing)]
    #[sqlx(rename = "password", default)]
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Row to insert; `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}
