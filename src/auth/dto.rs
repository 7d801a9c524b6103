use serde::{Deserialize, Serialize};

/// JWT payload used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,    // user ID
    pub iat: i64,    // issued at (unix timestamp)
    pub exp: i64,    // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}

/// Candidate user for registration and login checks.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: PublicUser,
}

/// Public part of the user returned with a token.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}
