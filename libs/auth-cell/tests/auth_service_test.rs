// libs/auth-cell/tests/auth_service_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Duration;
use serde_json::json;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::{method, path, query_param}};

use auth_cell::models::AuthError;
use auth_cell::services::*;
use security_cell::{CredentialHasher, PasswordSecurityService};
use shared_database::supabase::SupabaseClient;
use shared_models::auth::LoginCredentials;
use shared_utils::jwt::JwtCodec;
use shared_utils::test_utils::TestConfig;

struct TestSetup {
    service: AuthService,
    sessions: Arc<TokenSessionManager>,
}

async fn setup() -> TestSetup {
    let hasher = Arc::new(PasswordSecurityService::low_cost());
    let lookup = Arc::new(InMemoryCredentialLookup::new());
    let hash = hasher.hash_password("s3cret-pass").unwrap();
    lookup.insert("anna@clinic.ru", "doctor-1", &hash).await;

    let codec = JwtCodec::new("auth-service-secret", "HS256").unwrap();
    let sessions = Arc::new(TokenSessionManager::new(
        codec,
        Arc::new(InMemoryExpiringStore::new()),
        Duration::minutes(30),
        Duration::days(7),
    ));

    TestSetup {
        service: AuthService::new(sessions.clone(), lookup, hasher),
        sessions,
    }
}

fn credentials(email: &str, password: &str) -> LoginCredentials {
    LoginCredentials {
        email: email.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_login_issues_tokens_for_subject() {
    let setup = setup().await;

    let pair = setup.service
        .login(&credentials(" Anna@Clinic.RU ", "s3cret-pass"))
        .await
        .unwrap();

    let subject = setup.service.authenticate_access_token(&pair.access_token).unwrap();
    assert_eq!(subject.subject_id, "doctor-1");
    assert!(subject.expires_at.is_some());
    assert_eq!(setup.sessions.verify_refresh_token(&pair.refresh_token).await.unwrap(), "doctor-1");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let setup = setup().await;

    assert_matches!(
        setup.service.login(&credentials("anna@clinic.ru", "wrong")).await,
        Err(AuthError::InvalidCredentials)
    );
    assert_matches!(
        setup.service.login(&credentials("nobody@clinic.ru", "s3cret-pass")).await,
        Err(AuthError::InvalidCredentials)
    );
    assert_matches!(
        setup.service.login(&credentials("not-an-email", "s3cret-pass")).await,
        Err(AuthError::InvalidCredentials)
    );
}

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let setup = setup().await;
    let pair = setup.service
        .login(&credentials("anna@clinic.ru", "s3cret-pass"))
        .await
        .unwrap();

    let rotated = setup.service.refresh(&pair.refresh_token).await.unwrap();

    assert_ne!(rotated.refresh_token, pair.refresh_token);
    assert_matches!(
        setup.service.refresh(&pair.refresh_token).await,
        Err(AuthError::RefreshTokenInvalid)
    );
    assert_eq!(setup.sessions.verify_refresh_token(&rotated.refresh_token).await.unwrap(), "doctor-1");
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let setup = setup().await;
    let pair = setup.service
        .login(&credentials("anna@clinic.ru", "s3cret-pass"))
        .await
        .unwrap();

    setup.service.logout(&pair.refresh_token).await.unwrap();
    setup.service.logout(&pair.refresh_token).await.unwrap();

    assert_matches!(
        setup.service.refresh(&pair.refresh_token).await,
        Err(AuthError::RefreshTokenInvalid)
    );
    // Access tokens stay valid until they expire.
    assert!(setup.service.authenticate_access_token(&pair.access_token).is_ok());
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let setup = setup().await;
    let pair = setup.sessions.create_tokens("doctor-1").await.unwrap();

    assert_matches!(
        setup.service.authenticate_access_token(&pair.refresh_token),
        Err(AuthError::TokenInvalid(_))
    );
    let header = format!("Bearer {}", pair.access_token);
    assert_eq!(setup.service.authenticate_header(&header).unwrap().subject_id, "doctor-1");
}

#[tokio::test]
async fn test_supabase_lookup_queries_active_accounts() {
    let server = MockServer::start().await;
    let id = uuid::Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("email", "eq.ivan@mail.ru"))
        .and(query_param("is_deleted", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": id, "password_hash": "$argon2id$stub" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    let lookup = SupabaseCredentialLookup::patients(Arc::new(SupabaseClient::new(&config)));

    let record = lookup.find_by_email("ivan@mail.ru").await.unwrap().unwrap();

    assert_eq!(record.subject_id, id.to_string());
    assert_eq!(record.password_hash, "$argon2id$stub");
}
