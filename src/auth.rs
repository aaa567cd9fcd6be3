//! Bearer-token credential validation.
//!
//! Validation is HS256-only and stateless: the server never issues
//! tokens in the request path, it only checks signatures and expiry
//! against the shared secret loaded at startup. [`issue_token`] exists
//! for local development and test fixtures.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject the token was issued to.
    pub sub: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiration, unix seconds.
    pub exp: i64,
}

/// Validates presented credentials into [`Claims`].
pub trait CredentialValidator: Send + Sync {
    /// Validate a raw bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] when the token is malformed,
    /// carries a bad signature, or has expired.
    fn validate(&self, token: &str) -> Result<Claims>;
}

/// HS256 validator backed by a shared secret.
pub struct JwtValidator {
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Build a validator from the shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

impl CredentialValidator for JwtValidator {
    fn validate(&self, token: &str) -> Result<Claims> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AppError::Unauthorized("invalid or expired token".to_string()))?;
        Ok(data.claims)
    }
}

/// Extract the token from an `Authorization` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Issue an HS256 token for `sub`, valid for `ttl_seconds`.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if encoding fails.
pub fn issue_token(secret: &str, sub: &str, ttl_seconds: i64) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: sub.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_seconds.max(1))).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))
}
