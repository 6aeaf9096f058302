use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{AuthError, CredentialRecord};

/// Resolves a login email to the stored credential of an active account.
#[async_trait]
pub trait CredentialLookup: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, AuthError>;
}

#[derive(Deserialize)]
struct CredentialRow {
    id: Uuid,
    password_hash: String,
}

pub struct SupabaseCredentialLookup {
    supabase: Arc<SupabaseClient>,
    table: String,
}

impl SupabaseCredentialLookup {
    pub fn new(supabase: Arc<SupabaseClient>, table: impl Into<String>) -> Self {
        Self { supabase, table: table.into() }
    }

    pub fn doctors(supabase: Arc<SupabaseClient>) -> Self {
        Self::new(supabase, "doctors")
    }

    pub fn patients(supabase: Arc<SupabaseClient>) -> Self {
        Self::new(supabase, "patients")
    }
}

#[async_trait]
impl CredentialLookup for SupabaseCredentialLookup {
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, AuthError> {
        let path = format!(
            "/rest/v1/{}?select=id,password_hash&email=eq.{}&is_deleted=eq.false&limit=1",
            self.table,
            urlencoding::encode(email),
        );

        let rows: Vec<CredentialRow> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;

        Ok(rows.into_iter().next().map(|row| CredentialRecord {
            subject_id: row.id.to_string(),
            password_hash: row.password_hash,
        }))
    }
}

#[derive(Default)]
pub struct InMemoryCredentialLookup {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl InMemoryCredentialLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, email: &str, subject_id: &str, password_hash: &str) {
        self.records.write().await.insert(
            email.to_lowercase(),
            CredentialRecord {
                subject_id: subject_id.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
    }
}

#[async_trait]
impl CredentialLookup for InMemoryCredentialLookup {
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, AuthError> {
        Ok(self.records.read().await.get(email).cloned())
    }
}
