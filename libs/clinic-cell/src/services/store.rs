use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::{HeaderMap, HeaderValue}, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Clinic, ClinicError};

const CLINICS_PATH: &str = "/rest/v1/clinics";
const CLINIC_DOCTORS_PATH: &str = "/rest/v1/clinic_doctors";

#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Clinic>, ClinicError>;

    async fn insert(&self, clinic: &Clinic) -> Result<Clinic, ClinicError>;

    async fn soft_delete(&self, id: Uuid) -> Result<(), ClinicError>;

    /// Attaching an already attached doctor is a no-op.
    async fn attach_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<(), ClinicError>;

    async fn detach_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<(), ClinicError>;

    async fn doctor_ids(&self, clinic_id: Uuid) -> Result<Vec<Uuid>, ClinicError>;
}

fn db_error(err: anyhow::Error) -> ClinicError {
    ClinicError::DatabaseError(err.to_string())
}

#[derive(Deserialize)]
struct ClinicDoctorRow {
    doctor_id: Uuid,
}

pub struct SupabaseClinicStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseClinicStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase, auth_token: None }
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }
}

#[async_trait]
impl ClinicStore for SupabaseClinicStore {
    async fn get(&self, id: Uuid) -> Result<Option<Clinic>, ClinicError> {
        let path = format!("{}?id=eq.{}", CLINICS_PATH, id);
        let clinics: Vec<Clinic> = self.supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(db_error)?;
        Ok(clinics.into_iter().next())
    }

    async fn insert(&self, clinic: &Clinic) -> Result<Clinic, ClinicError> {
        let body = serde_json::to_value(clinic).map_err(|e| ClinicError::DatabaseError(e.to_string()))?;
        let rows = self.supabase
            .request_returning(Method::POST, CLINICS_PATH, self.auth_token.as_deref(), body)
            .await
            .map_err(db_error)?;

        let row = rows.into_iter()
            .next()
            .ok_or_else(|| ClinicError::DatabaseError("Store returned no rows".to_string()))?;
        serde_json::from_value(row).map_err(|e| ClinicError::DatabaseError(e.to_string()))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), ClinicError> {
        let path = format!("{}?id=eq.{}", CLINICS_PATH, id);
        let _: Value = self.supabase
            .request(Method::PATCH, &path, self.auth_token.as_deref(), Some(json!({ "is_deleted": true })))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn attach_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<(), ClinicError> {
        let path = format!("{}?on_conflict=clinic_id,doctor_id", CLINIC_DOCTORS_PATH);
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("resolution=ignore-duplicates"));

        let _: Value = self.supabase
            .request_with_headers(
                Method::POST,
                &path,
                self.auth_token.as_deref(),
                Some(json!({ "clinic_id": clinic_id, "doctor_id": doctor_id })),
                Some(headers),
            )
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn detach_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<(), ClinicError> {
        let path = format!(
            "{}?clinic_id=eq.{}&doctor_id=eq.{}",
            CLINIC_DOCTORS_PATH, clinic_id, doctor_id
        );
        let _: Value = self.supabase
            .request(Method::DELETE, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn doctor_ids(&self, clinic_id: Uuid) -> Result<Vec<Uuid>, ClinicError> {
        let path = format!("{}?select=doctor_id&clinic_id=eq.{}", CLINIC_DOCTORS_PATH, clinic_id);
        let rows: Vec<ClinicDoctorRow> = self.supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(|r| r.doctor_id).collect())
    }
}

#[derive(Default)]
pub struct InMemoryClinicStore {
    clinics: RwLock<HashMap<Uuid, Clinic>>,
    links: RwLock<BTreeSet<(Uuid, Uuid)>>,
}

impl InMemoryClinicStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClinicStore for InMemoryClinicStore {
    async fn get(&self, id: Uuid) -> Result<Option<Clinic>, ClinicError> {
        Ok(self.clinics.read().await.get(&id).cloned())
    }

    async fn insert(&self, clinic: &Clinic) -> Result<Clinic, ClinicError> {
        self.clinics.write().await.insert(clinic.id, clinic.clone());
        Ok(clinic.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), ClinicError> {
        let mut clinics = self.clinics.write().await;
        let clinic = clinics.get_mut(&id).ok_or(ClinicError::NotFound)?;
        clinic.is_deleted = true;
        Ok(())
    }

    async fn attach_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<(), ClinicError> {
        self.links.write().await.insert((clinic_id, doctor_id));
        Ok(())
    }

    async fn detach_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<(), ClinicError> {
        self.links.write().await.remove(&(clinic_id, doctor_id));
        Ok(())
    }

    async fn doctor_ids(&self, clinic_id: Uuid) -> Result<Vec<Uuid>, ClinicError> {
        Ok(self.links
            .read()
            .await
            .iter()
            .filter(|(c, _)| *c == clinic_id)
            .map(|(_, d)| *d)
            .collect())
    }
}
