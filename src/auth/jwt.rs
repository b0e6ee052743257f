//! JWT Token Handler
//! Mission: Sign and verify identity tokens with the server secret

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use std::fmt;
use tracing::debug;

/// Why a token failed verification. Callers on the request path must not
/// reveal the distinction to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Invalid,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "token expired"),
            TokenError::Invalid => write!(f, "token invalid"),
        }
    }
}

impl std::error::Error for TokenError {}

/// JWT Handler for token operations
pub struct JwtHandler {
    secret: String,
    expiration_hours: u32,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: String) -> Self {
        Self::with_expiration_hours(secret, 24)
    }

    pub fn with_expiration_hours(secret: String, expiration_hours: u32) -> Self {
        Self {
            secret,
            expiration_hours,
        }
    }

    /// Lifetime of newly signed tokens, in seconds
    pub fn expires_in(&self) -> usize {
        self.expiration_hours as usize * 3600
    }

    /// Sign a token for a user. Returns the token and its lifetime in seconds.
    pub fn sign(&self, user: &User) -> Result<(String, usize)> {
        let expiration = Utc::now()
            .checked_add_signed(chrono::Duration::hours(i64::from(self.expiration_hours)))
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            exp: expiration,
        };

        debug!(
            "Signing JWT for user {} ({}), expires in {}h",
            user.username, user.id, self.expiration_hours
        );

        let token = self.encode_claims(&claims)?;
        Ok((token, self.expires_in()))
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to generate JWT")
    }

    /// Verify signature and expiry, then hand back the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use uuid::Uuid;

    fn create_test_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            password_hash: "hash".to_string(),
            role,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());
        let user = create_test_user(Role::User);

        let (token, expires_in) = handler.sign(&user).unwrap();
        assert!(!token.is_empty());
        assert_eq!(expires_in, 24 * 3600);

        let claims = handler.verify(&token).unwrap();
        assert_eq!(claims.username, user.username);
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, user.role);
        assert!(claims.exp > Utc::now().timestamp() as usize);
    }

    #[test]
    fn test_malformed_token_rejected() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());

        assert_eq!(handler.verify("invalid.token.here"), Err(TokenError::Invalid));
        assert_eq!(handler.verify(""), Err(TokenError::Invalid));
    }

    #[test]
    fn test_different_secrets_reject() {
        let handler1 = JwtHandler::new("secret1".to_string());
        let handler2 = JwtHandler::new("secret2".to_string());
        let user = create_test_user(Role::Admin);

        let (token, _) = handler1.sign(&user).unwrap();

        assert_eq!(handler2.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_token_rejected() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            username: "late".to_string(),
            role: Role::Admin,
            exp: (Utc::now().timestamp() - 3600) as usize,
        };

        let token = handler.encode_claims(&claims).unwrap();
        assert_eq!(handler.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_custom_expiration() {
        let handler = JwtHandler::with_expiration_hours("s".to_string(), 2);
        let user = create_test_user(Role::User);

        let (_, expires_in) = handler.sign(&user).unwrap();
        assert_eq!(expires_in, 7200);
    }
}
