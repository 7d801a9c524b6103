use serde::Deserialize;

/// Body of `PUT`/`PATCH /users/:id`; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}
