use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::AuthError;

/// Key-value store whose entries vanish once their TTL elapses.
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AuthError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), AuthError>;

    /// Reads and removes `key` in one step.
    async fn take(&self, key: &str) -> Result<Option<String>, AuthError> {
        let value = self.get(key).await?;
        if value.is_some() {
            self.delete(key).await?;
        }
        Ok(value)
    }
}

const KEY_PREFIX: &str = "refresh_token:";

fn store_error(e: impl std::fmt::Display) -> AuthError {
    error!("Token store failure: {}", e);
    AuthError::StoreError(e.to_string())
}

pub struct RedisTokenStore {
    pool: Pool,
}

impl RedisTokenStore {
    pub async fn new(config: &AppConfig) -> Result<Self, AuthError> {
        let cfg = Config::from_url(config.redis_url_or_default());
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| AuthError::Configuration(format!("Failed to create Redis pool: {}", e)))?;

        let store = Self::from_pool(pool);
        let mut conn = store.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(store_error)?;

        info!("Redis token store initialized");
        Ok(store)
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<Connection, AuthError> {
        self.pool.get().await.map_err(store_error)
    }

    fn key(token: &str) -> String {
        format!("{}{}", KEY_PREFIX, token)
    }
}

#[async_trait]
impl ExpiringStore for RedisTokenStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AuthError> {
        let mut conn = self.connection().await?;
        if ttl.is_zero() {
            // An entry that is already expired must never be readable.
            let _: i64 = conn.del(Self::key(key)).await.map_err(store_error)?;
            debug!("Skipped storing token with an empty lifetime");
            return Ok(());
        }
        // EX takes whole seconds and rejects 0.
        let seconds = ttl.as_secs().max(1);
        let _: () = redis::cmd("SET")
            .arg(Self::key(key))
            .arg(value)
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let mut conn = self.connection().await?;
        conn.get(Self::key(key)).await.map_err(store_error)
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(Self::key(key)).await.map_err(store_error)?;
        debug!("Removed {} token entries", removed);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AuthError> {
        let mut conn = self.connection().await?;
        redis::cmd("GETDEL")
            .arg(Self::key(key))
            .query_async(&mut conn)
            .await
            .map_err(store_error)
    }
}

/// Expiry instant of an entry; `None` outlives any representable instant.
type Deadline = Option<Instant>;

fn alive(deadline: &Deadline, now: Instant) -> bool {
    deadline.map_or(true, |at| at > now)
}

/// Process-local store, entries are evicted lazily on access.
#[derive(Default)]
pub struct InMemoryExpiringStore {
    entries: Mutex<HashMap<String, (String, Deadline)>>,
}

impl InMemoryExpiringStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, deadline)| alive(deadline, now));
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ExpiringStore for InMemoryExpiringStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AuthError> {
        let deadline = Instant::now().checked_add(ttl);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, deadline)) if alive(deadline, Instant::now()) => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AuthError> {
        let removed = self.entries.lock().await.remove(key);
        Ok(removed
            .filter(|(_, deadline)| alive(deadline, Instant::now()))
            .map(|(value, _)| value))
    }
}
