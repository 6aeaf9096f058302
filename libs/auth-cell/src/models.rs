use serde::Deserialize;
use thiserror::Error;

use shared_models::error::AppError;
use shared_utils::jwt::JwtError;

/// Stored credential for one login identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialRecord {
    pub subject_id: String,
    pub password_hash: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    #[error("Refresh token is invalid or has been revoked")]
    RefreshTokenInvalid,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Token store error: {0}")]
    StoreError(String),

    #[error("Authentication is misconfigured: {0}")]
    Configuration(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::TokenExpired,
            JwtError::Invalid(reason) => AuthError::TokenInvalid(reason),
            other => AuthError::Configuration(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::StoreError(_) | AuthError::Configuration(_) => AppError::Internal(err.to_string()),
            _ => AppError::Auth(err.to_string()),
        }
    }
}
