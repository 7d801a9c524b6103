use std::str::FromStr;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::AppConfig;

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        name       TEXT NOT NULL,
        email      TEXT NOT NULL UNIQUE,
        password   TEXT NOT NULL,
        phone      TEXT,
        address    TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

pub async fn connect(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .context("parse DATABASE_URL")?
        .create_if_missing(true);
    let db = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .context("connect to database")?;
    Ok(db)
}

/// Creates the `users` table when it does not exist yet.
pub async fn bootstrap(db: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_USERS).execute(db).await?;
    info!("users table ready");
    Ok(())
}

/// Single-connection in-memory pool; every connection would otherwise get its own database.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<std::time::Duration>)
        .max_lifetime(None::<std::time::Duration>)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    bootstrap(&db).await.expect("bootstrap users table");
    db
}
