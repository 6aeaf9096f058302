use std::env;
use std::str::FromStr;

use dotenv::dotenv;
use tracing::warn;

const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 30;
const DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub jwt_secret: String,
    pub jwt_algorithm: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    pub redis_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("SECRET_KEY")
                .unwrap_or_else(|_| {
                    warn!("SECRET_KEY not set, using empty value");
                    String::new()
                }),
            jwt_algorithm: env::var("ALGORITHM")
                .unwrap_or_else(|_| {
                    warn!("ALGORITHM not set, using HS256");
                    "HS256".to_string()
                }),
            access_token_expire_minutes: parse_or_default(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
            ),
            refresh_token_expire_days: parse_or_default(
                "REFRESH_TOKEN_EXPIRE_DAYS",
                DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS,
            ),
            redis_url: env::var("REDIS_URL").ok(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.jwt_secret.is_empty()
    }

    pub fn redis_url_or_default(&self) -> String {
        self.redis_url
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string())
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", key, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using {}", key, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            jwt_secret: "secret".to_string(),
            jwt_algorithm: "HS256".to_string(),
            access_token_expire_minutes: DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
            refresh_token_expire_days: DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS,
            redis_url: None,
        }
    }

    #[test]
    fn missing_secret_means_unconfigured() {
        assert!(config().is_configured());
        assert!(!AppConfig { jwt_secret: String::new(), ..config() }.is_configured());
    }

    #[test]
    fn redis_url_falls_back_to_localhost() {
        assert_eq!(config().redis_url_or_default(), "redis://localhost:6379");

        let custom = AppConfig { redis_url: Some("redis://cache:6380".to_string()), ..config() };
        assert_eq!(custom.redis_url_or_default(), "redis://cache:6380");
    }

    #[test]
    fn unset_numeric_variable_uses_default() {
        let value: i64 = parse_or_default("CLINIC_TEST_UNSET_NUMERIC_VARIABLE", 42);
        assert_eq!(value, 42);
    }
}
