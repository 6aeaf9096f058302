use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{TokenClaims, TokenKind};

use crate::jwt::JwtCodec;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            jwt_algorithm: "HS256".to_string(),
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
            redis_url: None,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(subject: &str, secret: &str, exp_minutes: i64) -> String {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: subject.to_string(),
            exp: (now + Duration::minutes(exp_minutes)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            kind: TokenKind::Access,
        };

        JwtCodec::new(secret, "HS256")
            .and_then(|codec| codec.encode(&claims))
            .expect("test token should encode")
    }

    pub fn create_expired_token(subject: &str, secret: &str) -> String {
        Self::create_test_token(subject, secret, -5)
    }

    pub fn create_invalid_signature_token(subject: &str) -> String {
        Self::create_test_token(subject, "wrong-secret", 60)
    }

    /// Swaps the first signature character so the token no longer verifies.
    pub fn tamper_signature(token: &str) -> String {
        match token.rfind('.') {
            Some(dot) if dot + 1 < token.len() => {
                let (head, signature) = token.split_at(dot + 1);
                let mut chars = signature.chars();
                let first = chars.next().unwrap_or('A');
                let replacement = if first == 'A' { 'B' } else { 'A' };
                format!("{}{}{}", head, replacement, chars.as_str())
            }
            _ => format!("{}A", token),
        }
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn consultation_row(id: Uuid, doctor_id: Uuid, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": id,
            "doctor_id": doctor_id,
            "patient_id": Uuid::new_v4(),
            "clinic_id": Uuid::new_v4(),
            "start_time": start,
            "end_time": end,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "is_deleted": false
        })
    }

    pub fn patient_row(id: Uuid, email: &str, tag_social: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": "Ivan",
            "family_name": "Petrov",
            "patronymic": "Sergeevich",
            "gender": "male",
            "email": email,
            "phone": "+79990001122",
            "password_hash": "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA",
            "tag_social": tag_social,
            "is_deleted": false
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.jwt_secret.is_empty());
    }

    #[test]
    fn test_jwt_token_creation() {
        let token = JwtTestUtils::create_test_token("u1", "test-secret", 1);

        assert_eq!(token.split('.').count(), 3);
        assert_ne!(JwtTestUtils::tamper_signature(&token), token);
    }
}
