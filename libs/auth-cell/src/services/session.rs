use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{TokenClaims, TokenKind, TokenPair, TOKEN_TYPE_BEARER};
use shared_utils::jwt::JwtCodec;

use crate::models::AuthError;
use crate::services::store::ExpiringStore;

/// Issues signed access/refresh tokens and tracks live refresh tokens
/// in an [`ExpiringStore`]. Access tokens are stateless.
pub struct TokenSessionManager {
    codec: JwtCodec,
    store: Arc<dyn ExpiringStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSessionManager")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSessionManager {
    pub fn new(
        codec: JwtCodec,
        store: Arc<dyn ExpiringStore>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self { codec, store, access_ttl, refresh_ttl }
    }

    pub fn from_config(config: &AppConfig, store: Arc<dyn ExpiringStore>) -> Result<Self, AuthError> {
        let codec = JwtCodec::from_config(config)?;
        let access_ttl = Duration::try_minutes(config.access_token_expire_minutes).ok_or_else(|| {
            AuthError::Configuration(format!(
                "ACCESS_TOKEN_EXPIRE_MINUTES out of range: {}",
                config.access_token_expire_minutes
            ))
        })?;
        let refresh_ttl = Duration::try_days(config.refresh_token_expire_days).ok_or_else(|| {
            AuthError::Configuration(format!(
                "REFRESH_TOKEN_EXPIRE_DAYS out of range: {}",
                config.refresh_token_expire_days
            ))
        })?;
        Ok(Self::new(codec, store, access_ttl, refresh_ttl))
    }

    pub async fn create_tokens(&self, subject_id: &str) -> Result<TokenPair, AuthError> {
        let access_token = self.issue(subject_id, TokenKind::Access, self.access_ttl)?;
        let refresh_token = self.issue(subject_id, TokenKind::Refresh, self.refresh_ttl)?;

        // A non-positive window leaves nothing in the store to verify against.
        let ttl = self.refresh_ttl.to_std().unwrap_or_default();
        if ttl.is_zero() {
            debug!("Refresh token for subject {} issued already expired", subject_id);
        } else {
            self.store.set(&refresh_token, subject_id, ttl).await?;
        }

        info!("Issued token pair for subject {}", subject_id);
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
        })
    }

    /// Verifies signature and expiry, returning the embedded subject.
    pub fn decode(&self, token: &str) -> Result<String, AuthError> {
        Ok(self.decode_claims(token)?.sub)
    }

    pub fn decode_claims(&self, token: &str) -> Result<TokenClaims, AuthError> {
        Ok(self.codec.decode(token)?)
    }

    /// Store presence is the only check; eviction doubles as expiry.
    pub async fn verify_refresh_token(&self, token: &str) -> Result<String, AuthError> {
        self.store
            .get(token)
            .await?
            .ok_or(AuthError::RefreshTokenInvalid)
    }

    /// Consumes a refresh token so it verifies at most once.
    pub async fn consume_refresh_token(&self, token: &str) -> Result<String, AuthError> {
        self.store
            .take(token)
            .await?
            .ok_or(AuthError::RefreshTokenInvalid)
    }

    pub async fn revoke_refresh_token(&self, token: &str) -> Result<(), AuthError> {
        self.store.delete(token).await?;
        debug!("Refresh token revoked");
        Ok(())
    }

    fn issue(&self, subject_id: &str, kind: TokenKind, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            AuthError::Configuration(format!("{:?} token lifetime out of range", kind))
        })?;
        let claims = TokenClaims {
            sub: subject_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            kind,
        };
        Ok(self.codec.encode(&claims)?)
    }
}
