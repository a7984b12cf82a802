//! JWT access-token handling.
//!
//! The server does not issue tokens to end users; the campus identity service does that. This module verifies
//! tokens (HS256 over a shared secret) and exposes the claims to handlers. [`TokenIssuer`] mints tokens with the
//! same shape for tests and local tooling.
use std::future::{ready, Ready};

use actix_web::{FromRequest, HttpMessage, HttpRequest};
use campus_eats_engine::db_types::Role;
use ce_common::Secret;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, errors::AuthError};

const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 60 * 60 * 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id of the caller.
    pub sub: String,
    pub role: Role,
    /// For vendor tokens, the vendor the caller acts for. Older tokens omit this and fall back to the staff
    /// linkage table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Verifies an access token and returns its claims. Expiry is checked by `jsonwebtoken`'s default validation.
pub fn validate_token(token: &str, secret: &Secret<String>) -> Result<JwtClaims, AuthError> {
    let key = DecodingKey::from_secret(secret.reveal().as_bytes());
    let data = decode::<JwtClaims>(token, &key, &Validation::new(Algorithm::HS256))
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;
    Ok(data.claims)
}

// The ACL middleware validates the token and stashes the claims in the request extensions; handlers just declare
// a `JwtClaims` parameter.
impl FromRequest for JwtClaims {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let claims = req
            .extensions()
            .get::<JwtClaims>()
            .cloned()
            .ok_or_else(|| actix_web::error::ErrorUnauthorized("No access token was provided."));
        ready(claims)
    }
}

pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { key }
    }

    /// Mints a signed access token for the given subject and role, valid for `lifetime_secs` (default 24h).
    pub fn issue_token(
        &self,
        sub: &str,
        role: Role,
        vendor_id: Option<String>,
        lifetime_secs: Option<i64>,
    ) -> Result<String, AuthError> {
        let exp = chrono::Utc::now().timestamp() + lifetime_secs.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let claims = JwtClaims { sub: sub.to_string(), role, vendor_id, exp };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}
