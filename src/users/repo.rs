use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::users::repo_types::{NewUser, User};
use crate::users::update::{build_update, UserChanges};

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

fn map_write_err(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::DuplicateEmail
    } else {
        AppError::Store(err)
    }
}

impl User {
    /// Insert a user. Email uniqueness is left to the table constraint.
    pub async fn create(db: &SqlitePool, new: &NewUser) -> AppResult<User> {
        let now = OffsetDateTime::now_utc();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, phone, address, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, email, phone, address, created_at, updated_at
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.phone)
        .bind(&new.address)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await
        .map_err(map_write_err)?;
        debug!(user_id = user.id, "user inserted");
        Ok(user)
    }

    /// Find a user by email; `include_secret` also loads the password hash.
    pub async fn find_by_email(
        db: &SqlitePool,
        email: &str,
        include_secret: bool,
    ) -> AppResult<User> {
        let sql = if include_secret {
            r#"
            SELECT id, name, email, password, phone, address, created_at, updated_at
            FROM users
            WHERE email = ?
            "#
        } else {
            r#"
            SELECT id, name, email, phone, address, created_at, updated_at
            FROM users
            WHERE email = ?
            "#
        };
        sqlx::query_as::<_, User>(sql)
            .bind(email)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn list_all(db: &SqlitePool) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, address, created_at, updated_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    /// Apply `changes` to the row with `id`, returning the affected-count.
    pub async fn update_partial(db: &SqlitePool, id: i64, changes: UserChanges) -> AppResult<u64> {
        let mut qb = build_update(id, changes, OffsetDateTime::now_utc())?;
        let res = qb.build().execute(db).await.map_err(map_write_err)?;
        debug!(user_id = id, rows = res.rows_affected(), "user updated");
        Ok(res.rows_affected())
    }

    /// Delete the row with `id`, returning the affected-count.
    pub async fn delete_by_id(db: &SqlitePool, id: i64) -> AppResult<u64> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        debug!(user_id = id, rows = res.rows_affected(), "user deleted");
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{hash_password, verify_password};
    use crate::db::memory_pool;

    fn new_user(name: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            password_hash: hash_password(password).expect("hash"),
            phone: None,
            address: None,
        }
    }

    async fn count(db: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_then_fetch_with_secret_verifies() {
        let db = memory_pool().await;
        let created = User::create(&db, &new_user("Ann", "a@b.com", "Sup3r!"))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert!(created.password_hash.is_none());

        let stored = User::find_by_email(&db, "a@b.com", true).await.unwrap();
        let hash = stored.password_hash.expect("secret requested");
        assert_ne!(hash, "Sup3r!");
        assert!(verify_password("Sup3r!", &hash));
        assert_eq!(stored.id, created.id);
    }

    #[tokio::test]
    async fn fetch_without_secret_omits_hash() {
        let db = memory_pool().await;
        User::create(&db, &new_user("Ann", "a@b.com", "Sup3r!"))
            .await
            .unwrap();
        let user = User::find_by_email(&db, "a@b.com", false).await.unwrap();
        assert!(user.password_hash.is_none());
        assert_eq!(user.name, "Ann");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_new_row() {
        let db = memory_pool().await;
        User::create(&db, &new_user("Ann", "a@b.com", "Sup3r!"))
            .await
            .unwrap();
        let before = count(&db).await;

        let err = User::create(&db, &new_user("Other", "a@b.com", "0ther!"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
        assert_eq!(count(&db).await, before);
    }

    #[tokio::test]
    async fn missing_email_is_not_found() {
        let db = memory_pool().await;
        let err = User::find_by_email(&db, "nobody@b.com", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_all_returns_every_user_without_secret() {
        let db = memory_pool().await;
        User::create(&db, &new_user("Ann", "a@b.com", "Sup3r!"))
            .await
            .unwrap();
        User::create(&db, &new_user("Bob", "b@b.com", "Sup3r!"))
            .await
            .unwrap();
        let users = User::list_all(&db).await.unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.password_hash.is_none()));
        assert_eq!(users[0].name, "Ann");
    }

    #[tokio::test]
    async fn update_partial_changes_only_given_fields() {
        let db = memory_pool().await;
        let user = User::create(&db, &new_user("Ann", "a@b.com", "Sup3r!"))
            .await
            .unwrap();
        let changes = UserChanges {
            phone: Some("0123456789".into()),
            ..Default::default()
        };
        assert_eq!(User::update_partial(&db, user.id, changes).await.unwrap(), 1);

        let reloaded = User::find_by_email(&db, "a@b.com", false).await.unwrap();
        assert_eq!(reloaded.phone.as_deref(), Some("0123456789"));
        assert_eq!(reloaded.name, "Ann");
        assert!(reloaded.updated_at >= user.updated_at);
    }

    #[tokio::test]
    async fn update_partial_edge_cases() {
        let db = memory_pool().await;
        let err = User::update_partial(&db, 1, UserChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoFieldsToUpdate));

        let changes = UserChanges {
            name: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(User::update_partial(&db, 999, changes).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_to_taken_email_is_duplicate() {
        let db = memory_pool().await;
        User::create(&db, &new_user("Ann", "a@b.com", "Sup3r!"))
            .await
            .unwrap();
        let bob = User::create(&db, &new_user("Bob", "b@b.com", "Sup3r!"))
            .await
            .unwrap();
        let changes = UserChanges {
            email: Some("a@b.com".into()),
            ..Default::default()
        };
        let err = User::update_partial(&db, bob.id, changes).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn delete_reports_affected_count() {
        let db = memory_pool().await;
        let user = User::create(&db, &new_user("Ann", "a@b.com", "Sup3r!"))
            .await
            .unwrap();
        assert_eq!(User::delete_by_id(&db, user.id).await.unwrap(), 1);
        assert_eq!(User::delete_by_id(&db, user.id).await.unwrap(), 0);
        assert_eq!(count(&db).await, 0);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let db = memory_pool().await;
        let first = User::create(&db, &new_user("Ann", "a@b.com", "Sup3r!"))
            .await
            .unwrap();
        User::delete_by_id(&db, first.id).await.unwrap();
        let second = User::create(&db, &new_user("Ann", "a@b.com", "Sup3r!"))
            .await
            .unwrap();
        assert!(second.id > first.id);
    }
}
