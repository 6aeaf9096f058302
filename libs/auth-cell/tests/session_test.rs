// libs/auth-cell/tests/session_test.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Duration;

use auth_cell::models::AuthError;
use auth_cell::services::{ExpiringStore, InMemoryExpiringStore, TokenSessionManager};
use shared_models::auth::{TokenKind, TOKEN_TYPE_BEARER};
use shared_utils::jwt::JwtCodec;
use shared_utils::telemetry::init_tracing;
use shared_utils::test_utils::{JwtTestUtils, TestConfig};

const SECRET: &str = "session-test-secret";

fn manager_with(access_ttl: Duration, refresh_ttl: Duration) -> (TokenSessionManager, Arc<InMemoryExpiringStore>) {
    init_tracing();
    let store = Arc::new(InMemoryExpiringStore::new());
    let codec = JwtCodec::new(SECRET, "HS256").unwrap();
    let manager = TokenSessionManager::new(codec, store.clone(), access_ttl, refresh_ttl);
    (manager, store)
}

fn manager() -> (TokenSessionManager, Arc<InMemoryExpiringStore>) {
    manager_with(Duration::minutes(30), Duration::days(7))
}

#[tokio::test]
async fn test_issued_refresh_token_verifies_until_revoked() {
    let (manager, _) = manager();

    let pair = manager.create_tokens("u1").await.unwrap();
    assert_eq!(pair.token_type, TOKEN_TYPE_BEARER);
    assert_eq!(manager.verify_refresh_token(&pair.refresh_token).await.unwrap(), "u1");

    manager.revoke_refresh_token(&pair.refresh_token).await.unwrap();

    assert_matches!(
        manager.verify_refresh_token(&pair.refresh_token).await,
        Err(AuthError::RefreshTokenInvalid)
    );
}

#[tokio::test]
async fn test_both_tokens_decode_to_subject() {
    let (manager, _) = manager();
    let pair = manager.create_tokens("u1").await.unwrap();

    assert_eq!(manager.decode(&pair.access_token).unwrap(), "u1");
    assert_eq!(manager.decode(&pair.refresh_token).unwrap(), "u1");

    let access = manager.decode_claims(&pair.access_token).unwrap();
    let refresh = manager.decode_claims(&pair.refresh_token).unwrap();
    assert_eq!(access.kind, TokenKind::Access);
    assert_eq!(refresh.kind, TokenKind::Refresh);
    assert!(refresh.exp > access.exp);
}

#[tokio::test]
async fn test_expired_access_token_is_reported_as_expired() {
    let (manager, _) = manager_with(Duration::seconds(-30), Duration::days(7));
    let pair = manager.create_tokens("u1").await.unwrap();

    assert_matches!(manager.decode(&pair.access_token), Err(AuthError::TokenExpired));
}

#[tokio::test]
async fn test_tampered_and_foreign_tokens_are_invalid() {
    let (manager, _) = manager();
    let pair = manager.create_tokens("u1").await.unwrap();

    let tampered = JwtTestUtils::tamper_signature(&pair.access_token);
    assert_matches!(manager.decode(&tampered), Err(AuthError::TokenInvalid(_)));

    let foreign = JwtTestUtils::create_invalid_signature_token("u1");
    assert_matches!(manager.decode(&foreign), Err(AuthError::TokenInvalid(_)));

    let malformed = JwtTestUtils::create_malformed_token();
    assert_matches!(manager.decode(&malformed), Err(AuthError::TokenInvalid(_)));
}

#[tokio::test]
async fn test_externally_signed_token_with_same_secret_decodes() {
    let (manager, _) = manager();
    let token = JwtTestUtils::create_test_token("u42", SECRET, 5);

    assert_eq!(manager.decode(&token).unwrap(), "u42");
    assert_matches!(
        manager.decode(&JwtTestUtils::create_expired_token("u42", SECRET)),
        Err(AuthError::TokenExpired)
    );
}

#[tokio::test]
async fn test_revoking_unknown_token_is_a_no_op() {
    let (manager, _) = manager();

    manager.revoke_refresh_token("never-issued").await.unwrap();

    let pair = manager.create_tokens("u1").await.unwrap();
    manager.revoke_refresh_token(&pair.refresh_token).await.unwrap();
    manager.revoke_refresh_token(&pair.refresh_token).await.unwrap();
}

#[tokio::test]
async fn test_never_issued_refresh_token_is_invalid() {
    let (manager, _) = manager();
    let forged = JwtTestUtils::create_test_token("u1", SECRET, 60);

    assert_matches!(
        manager.verify_refresh_token(&forged).await,
        Err(AuthError::RefreshTokenInvalid)
    );
}

#[tokio::test]
async fn test_refresh_entry_expires_with_store_ttl() {
    let (manager, store) = manager_with(Duration::minutes(30), Duration::zero());

    let pair = manager.create_tokens("u1").await.unwrap();

    assert!(store.get(&pair.refresh_token).await.unwrap().is_none());
    assert_matches!(
        manager.verify_refresh_token(&pair.refresh_token).await,
        Err(AuthError::RefreshTokenInvalid)
    );
}

#[tokio::test]
async fn test_pairs_issued_together_never_share_a_refresh_token() {
    let (manager, store) = manager();

    let first = manager.create_tokens("u1").await.unwrap();
    let second = manager.create_tokens("u1").await.unwrap();

    assert_ne!(first.refresh_token, second.refresh_token);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_from_config_rejects_asymmetric_algorithm() {
    let mut config = TestConfig::default().to_app_config();
    config.jwt_algorithm = "RS256".to_string();

    let result = TokenSessionManager::from_config(&config, Arc::new(InMemoryExpiringStore::new()));

    assert_matches!(result, Err(AuthError::Configuration(_)));
}

/// Counts writes so tests can tell "never stored" from "stored, then evicted".
#[derive(Default)]
struct CountingStore {
    inner: InMemoryExpiringStore,
    writes: AtomicUsize,
}

#[async_trait]
impl ExpiringStore for CountingStore {
    async fn set(&self, key: &str, value: &str, ttl: std::time::Duration) -> Result<(), AuthError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        self.inner.delete(key).await
    }
}

#[tokio::test]
async fn test_expired_refresh_window_is_never_written() {
    let store = Arc::new(CountingStore::default());
    let codec = JwtCodec::new(SECRET, "HS256").unwrap();
    let manager = TokenSessionManager::new(codec, store.clone(), Duration::minutes(30), Duration::seconds(-5));

    let pair = manager.create_tokens("u1").await.unwrap();

    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    assert_matches!(
        manager.verify_refresh_token(&pair.refresh_token).await,
        Err(AuthError::RefreshTokenInvalid)
    );

    let live = TokenSessionManager::new(
        JwtCodec::new(SECRET, "HS256").unwrap(),
        store.clone(),
        Duration::minutes(30),
        Duration::days(1),
    );
    live.create_tokens("u1").await.unwrap();
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_out_of_range_lifetimes_in_config_are_rejected() {
    let mut config = TestConfig::default().to_app_config();
    config.refresh_token_expire_days = 200_000_000_000_000;

    assert_matches!(
        TokenSessionManager::from_config(&config, Arc::new(InMemoryExpiringStore::new())),
        Err(AuthError::Configuration(_))
    );

    let mut config = TestConfig::default().to_app_config();
    config.access_token_expire_minutes = i64::MAX;

    assert_matches!(
        TokenSessionManager::from_config(&config, Arc::new(InMemoryExpiringStore::new())),
        Err(AuthError::Configuration(_))
    );
}

#[tokio::test]
async fn test_lifetime_past_calendar_end_fails_instead_of_panicking() {
    let mut config = TestConfig::default().to_app_config();
    config.refresh_token_expire_days = 100_000_000_000;
    let manager = TokenSessionManager::from_config(&config, Arc::new(InMemoryExpiringStore::new())).unwrap();

    assert_matches!(manager.create_tokens("u1").await, Err(AuthError::Configuration(_)));

    let (manager, store) = manager_with(Duration::MAX, Duration::days(7));
    assert_matches!(manager.create_tokens("u1").await, Err(AuthError::Configuration(_)));
    assert!(store.is_empty().await);
}
