//! Bearer token verification
//!
//! Tokens are HMAC-signed JWTs (HS256/384/512). The `sub` claim carries the
//! identity id (a UUID) and `username` its display name. `exp` is optional
//! and only checked when present.

use std::collections::HashSet;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::entities::User;
use crate::error::LedgerError;

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id
    pub sub: String,
    /// Display name
    pub username: String,
    /// Expiration time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
}

impl JwtValidator {
    /// Create a new JWT validator. The secret must not be empty.
    pub fn new(secret: String) -> Result<Self, LedgerError> {
        if secret.is_empty() {
            return Err(LedgerError::Config("JWT secret is required".into()));
        }

        if secret.len() < 32 {
            warn!("JWT secret is shorter than 32 characters");
        }

        Ok(Self { secret })
    }

    /// Generate a token for `user`, optionally expiring at `exp`
    pub fn generate_token(&self, user: &User, exp: Option<u64>) -> Result<String, LedgerError> {
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            exp,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| LedgerError::Config(format!("Failed to generate token: {}", e)))
    }

    /// Verify a token and return the identity it names
    pub fn verify_token(&self, token: &str) -> Result<User, LedgerError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims = HashSet::new();

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let msg = match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidToken => "Invalid token",
                ErrorKind::InvalidSignature => "Invalid signature",
                _ => "Token validation failed",
            };
            LedgerError::Unauthorized(msg.into())
        })?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| LedgerError::Unauthorized("Subject is not a valid id".into()))?;

        Ok(User {
            id,
            username: data.claims.username,
        })
    }

    /// Resolve the caller from an Authorization header value
    pub fn authenticate(&self, auth_header: Option<&str>) -> Result<User, LedgerError> {
        let token = extract_token_from_header(auth_header)
            .ok_or_else(|| LedgerError::Unauthorized("unauthorized".into()))?;
        self.verify_token(token)
    }
}

/// Extract token from an Authorization header in "Bearer <token>" form.
/// The scheme name is case-insensitive.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let (scheme, token) = auth_header?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
