use axum::extract::FromRef;
use jsonwebtoken::{crypto, decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, error};

use crate::auth::dto::Claims;
use crate::config::JwtConfig;
use crate::error::{AppError, AppResult, AuthError};
use crate::state::AppState;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Splits `header.payload.signature` into the signed message and the signature.
fn split_token(token: &str) -> Result<(&str, &str), TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    let well_formed = segments.len() == 3
        && segments.iter().all(|s| {
            !s.is_empty()
                && s.bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        });
    if !well_formed {
        return Err(TokenError::Malformed);
    }
    token.rsplit_once('.').ok_or(TokenError::Malformed)
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::Expired,
            TokenError::Malformed | TokenError::SignatureInvalid => AuthError::Invalid,
        }
    }
}

/// Signing and verification keys, built once at startup from [`JwtConfig`].
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a token for `user_id` valid from `now` until `now + ttl`.
    pub fn issue(&self, user_id: i64, now: OffsetDateTime) -> AppResult<String> {
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "jwt encode failed");
            AppError::Encoding(e.to_string())
        })?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    /// Checks structure, signature and expiry against `now`, returning the subject.
    ///
    /// The signature is checked over the raw `header.payload` text before
    /// anything is decoded, so any altered byte reports `SignatureInvalid`.
    pub fn verify(&self, token: &str, now: OffsetDateTime) -> Result<i64, TokenError> {
        let (message, signature) = split_token(token)?;
        match crypto::verify(signature, message.as_bytes(), &self.decoding, ALGORITHM) {
            Ok(true) => {}
            Ok(false) | Err(_) => return Err(TokenError::SignatureInvalid),
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        // expiry is checked below against the caller's clock
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Malformed)?;

        if now.unix_timestamp() > data.claims.exp {
            return Err(TokenError::Expired);
        }
        debug!(user_id = data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}
