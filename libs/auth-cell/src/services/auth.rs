use std::sync::Arc;

use tracing::{debug, warn};

use security_cell::{validate_email, CredentialHasher};
use shared_models::auth::{AuthenticatedSubject, LoginCredentials, TokenKind, TokenPair};

use crate::models::AuthError;
use crate::services::credentials::CredentialLookup;
use crate::services::session::TokenSessionManager;

/// Pulls the token out of an `Authorization: Bearer <token>` value.
pub fn extract_bearer_token(header_value: &str) -> Result<&str, AuthError> {
    let token = header_value
        .strip_prefix("Bearer ")
        .or_else(|| header_value.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or_else(|| AuthError::TokenInvalid("Invalid authorization header format".to_string()))?;

    if token.is_empty() {
        return Err(AuthError::TokenInvalid("Missing bearer token".to_string()));
    }
    Ok(token)
}

pub struct AuthService {
    sessions: Arc<TokenSessionManager>,
    credentials: Arc<dyn CredentialLookup>,
    hasher: Arc<dyn CredentialHasher>,
}

impl AuthService {
    pub fn new(
        sessions: Arc<TokenSessionManager>,
        credentials: Arc<dyn CredentialLookup>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self { sessions, credentials, hasher }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenPair, AuthError> {
        let email = validate_email(&credentials.email).map_err(|_| AuthError::InvalidCredentials)?;
        debug!("Login attempt for {}", email);

        let record = self.credentials
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let verified = self.hasher
            .verify_password(&credentials.password, &record.password_hash)
            .unwrap_or_else(|e| {
                warn!("Credential check failed for subject {}: {}", record.subject_id, e);
                false
            });
        if !verified {
            return Err(AuthError::InvalidCredentials);
        }

        self.sessions.create_tokens(&record.subject_id).await
    }

    /// Exchanges a live refresh token for a new pair; the old one stops working.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let subject_id = self.sessions.consume_refresh_token(refresh_token).await?;
        self.sessions.create_tokens(&subject_id).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.sessions.revoke_refresh_token(refresh_token).await
    }

    pub fn authenticate_access_token(&self, token: &str) -> Result<AuthenticatedSubject, AuthError> {
        let claims = self.sessions.decode_claims(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::TokenInvalid("Refresh token presented as access token".to_string()));
        }

        Ok(AuthenticatedSubject {
            expires_at: claims.expires_at(),
            subject_id: claims.sub,
        })
    }

    pub fn authenticate_header(&self, header_value: &str) -> Result<AuthenticatedSubject, AuthError> {
        self.authenticate_access_token(extract_bearer_token(header_value)?)
    }
}
