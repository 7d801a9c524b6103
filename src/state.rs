use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config).await?;
        db::bootstrap(&db).await?;
        Ok(Self::from_parts(db, config))
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>) -> Self {
        let keys = JwtKeys::from_config(&config.jwt);
        Self { db, config, keys }
    }

    #[cfg(test)]
    pub async fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
        });
        Self::from_parts(db::memory_pool().await, config)
    }
}
