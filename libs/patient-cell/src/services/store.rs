use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use security_cell::ContactField;
use shared_database::supabase::{is_conflict, SupabaseClient};

use crate::models::{Patient, PatientError};

const PATIENTS_PATH: &str = "/rest/v1/patients";

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Patient>, PatientError>;

    async fn insert(&self, patient: &Patient) -> Result<Patient, PatientError>;

    async fn update(&self, patient: &Patient) -> Result<Patient, PatientError>;

    async fn soft_delete(&self, id: Uuid) -> Result<(), PatientError>;

    async fn contact_taken(
        &self,
        field: ContactField,
        value: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, PatientError>;
}

fn db_error(err: anyhow::Error) -> PatientError {
    if is_conflict(&err) {
        let field = if err.to_string().contains("phone") {
            ContactField::Phone
        } else {
            ContactField::Email
        };
        return PatientError::DuplicateContactField { field };
    }
    PatientError::DatabaseError(err.to_string())
}

fn first_patient(rows: Vec<Value>) -> Result<Option<Patient>, PatientError> {
    match rows.into_iter().next() {
        Some(row) => serde_json::from_value(row)
            .map(Some)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e))),
        None => Ok(None),
    }
}

pub struct SupabasePatientStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabasePatientStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase, auth_token: None }
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }
}

#[async_trait]
impl PatientStore for SupabasePatientStore {
    async fn get(&self, id: Uuid) -> Result<Option<Patient>, PatientError> {
        let path = format!("{}?id=eq.{}", PATIENTS_PATH, id);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(db_error)?;
        first_patient(rows)
    }

    async fn insert(&self, patient: &Patient) -> Result<Patient, PatientError> {
        let body = serde_json::to_value(patient)
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        let rows = self.supabase
            .request_returning(Method::POST, PATIENTS_PATH, self.auth_token.as_deref(), body)
            .await
            .map_err(db_error)?;

        debug!("Patient {} inserted", patient.id);
        first_patient(rows)?
            .ok_or_else(|| PatientError::DatabaseError("Store returned no rows".to_string()))
    }

    async fn update(&self, patient: &Patient) -> Result<Patient, PatientError> {
        let path = format!("{}?id=eq.{}", PATIENTS_PATH, patient.id);
        let body = serde_json::to_value(patient)
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        let rows = self.supabase
            .request_returning(Method::PATCH, &path, self.auth_token.as_deref(), body)
            .await
            .map_err(db_error)?;

        first_patient(rows)?.ok_or(PatientError::NotFound)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), PatientError> {
        let path = format!("{}?id=eq.{}", PATIENTS_PATH, id);
        let _: Value = self.supabase
            .request(Method::PATCH, &path, self.auth_token.as_deref(), Some(json!({ "is_deleted": true })))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn contact_taken(
        &self,
        field: ContactField,
        value: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, PatientError> {
        let mut query_parts = vec![
            "select=id".to_string(),
            format!("{}=eq.{}", field.as_str(), urlencoding::encode(value)),
            "is_deleted=eq.false".to_string(),
        ];
        if let Some(exclude_id) = exclude_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }
        query_parts.push("limit=1".to_string());

        let path = format!("{}?{}", PATIENTS_PATH, query_parts.join("&"));
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(db_error)?;
        Ok(!rows.is_empty())
    }
}

#[derive(Default)]
pub struct InMemoryPatientStore {
    rows: RwLock<HashMap<Uuid, Patient>>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn field_value(patient: &Patient, field: ContactField) -> Option<&str> {
        match field {
            ContactField::Email => Some(patient.email.as_str()),
            ContactField::Phone => patient.phone.as_deref(),
        }
    }

    fn clash(rows: &HashMap<Uuid, Patient>, candidate: &Patient) -> Option<ContactField> {
        [ContactField::Email, ContactField::Phone].into_iter().find(|&field| {
            let Some(value) = Self::field_value(candidate, field) else {
                return false;
            };
            rows.values().any(|p| {
                p.id != candidate.id && !p.is_deleted && Self::field_value(p, field) == Some(value)
            })
        })
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn get(&self, id: Uuid) -> Result<Option<Patient>, PatientError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn insert(&self, patient: &Patient) -> Result<Patient, PatientError> {
        let mut rows = self.rows.write().await;
        if let Some(field) = Self::clash(&rows, patient) {
            return Err(PatientError::DuplicateContactField { field });
        }
        rows.insert(patient.id, patient.clone());
        Ok(patient.clone())
    }

    async fn update(&self, patient: &Patient) -> Result<Patient, PatientError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&patient.id) {
            return Err(PatientError::NotFound);
        }
        if let Some(field) = Self::clash(&rows, patient) {
            return Err(PatientError::DuplicateContactField { field });
        }
        rows.insert(patient.id, patient.clone());
        Ok(patient.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), PatientError> {
        let mut rows = self.rows.write().await;
        let patient = rows.get_mut(&id).ok_or(PatientError::NotFound)?;
        patient.is_deleted = true;
        Ok(())
    }

    async fn contact_taken(
        &self,
        field: ContactField,
        value: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, PatientError> {
        Ok(self.rows.read().await.values().any(|p| {
            !p.is_deleted && Some(p.id) != exclude_id && Self::field_value(p, field) == Some(value)
        }))
    }
}
