//! Identity verification port.
//!
//! Sign-in happens at an external identity provider; this layer only checks
//! the bearer token it hands out and reads the stable user id from it.

use crate::domain::Identity;

/// Claims carried by an identity token.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub exp: i64,
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            name: claims.name,
            username: claims.username,
            avatar: claims.avatar,
        }
    }
}

/// Token service trait for identity tokens.
pub trait TokenService: Send + Sync {
    /// Issue a token for an identity (used by tests and local tooling).
    fn generate_token(&self, identity: &Identity) -> Result<String, AuthError>;

    /// Validate and decode a token.
    fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError>;

    fn expiration_seconds(&self) -> i64;
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing authorization header")]
    MissingAuth,
}
