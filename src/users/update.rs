//! Partial updates of a single user row.
//!
//! Column names come only from [`UserField::column`]; every value, the
//! timestamp and the id are bound parameters.

use sqlx::{QueryBuilder, Sqlite};
use time::OffsetDateTime;

use crate::error::{AppError, AppResult};

/// A mutable column together with its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserField {
    Name(String),
    Email(String),
    Phone(String),
    Address(String),
    PasswordHash(String),
}

impl UserField {
    pub fn column(&self) -> &'static str {
        match self {
            UserField::Name(_) => "name",
            UserField::Email(_) => "email",
            UserField::Phone(_) => "phone",
            UserField::Address(_) => "address",
            UserField::PasswordHash(_) => "password",
        }
    }

    fn into_value(self) -> String {
        match self {
            UserField::Name(v)
            | UserField::Email(v)
            | UserField::Phone(v)
            | UserField::Address(v)
            | UserField::PasswordHash(v) => v,
        }
    }
}

/// Sparse set of changes; each column appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.password_hash.is_none()
    }

    pub fn into_fields(self) -> Vec<UserField> {
        [
            self.name.map(UserField::Name),
            self.email.map(UserField::Email),
            self.phone.map(UserField::Phone),
            self.address.map(UserField::Address),
            self.password_hash.map(UserField::PasswordHash),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Builds `UPDATE users SET .. WHERE id = ?` for the given changes.
pub fn build_update(
    id: i64,
    changes: UserChanges,
    now: OffsetDateTime,
) -> AppResult<QueryBuilder<'static, Sqlite>> {
    if changes.is_empty() {
        return Err(AppError::NoFieldsToUpdate);
    }

    let mut qb = QueryBuilder::new("UPDATE users SET ");
    {
        let mut set = qb.separated(", ");
        for field in changes.into_fields() {
            set.push(format!("{} = ", field.column()));
            set.push_bind_unseparated(field.into_value());
        }
        set.push("updated_at = ");
        set.push_bind_unseparated(now);
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);
    Ok(qb)
}
