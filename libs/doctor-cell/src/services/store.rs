use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::{HeaderMap, HeaderValue}, Method};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use security_cell::ContactField;
use shared_database::supabase::{is_conflict, SupabaseClient};

use crate::models::{Doctor, DoctorError, Education, EducationHistory};

const DOCTORS_PATH: &str = "/rest/v1/doctors";
const EDUCATIONS_PATH: &str = "/rest/v1/educations";

#[async_trait]
pub trait DoctorStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Doctor>, DoctorError>;

    async fn insert(&self, doctor: &Doctor) -> Result<Doctor, DoctorError>;

    async fn update(&self, doctor: &Doctor) -> Result<Doctor, DoctorError>;

    async fn soft_delete(&self, id: Uuid) -> Result<(), DoctorError>;

    /// Whether an active doctor other than `exclude_id` already uses `value`.
    async fn contact_taken(
        &self,
        field: ContactField,
        value: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, DoctorError>;
}

#[async_trait]
pub trait EducationStore: Send + Sync {
    async fn get_for_doctor(&self, doctor_id: Uuid) -> Result<Option<Education>, DoctorError>;

    async fn upsert_for_doctor(
        &self,
        doctor_id: Uuid,
        history: &EducationHistory,
    ) -> Result<Education, DoctorError>;

    /// Removing a missing record is not an error.
    async fn delete_for_doctor(&self, doctor_id: Uuid) -> Result<(), DoctorError>;
}

/// Maps a unique-index violation to the contact column named in the message.
fn write_error(err: anyhow::Error) -> DoctorError {
    if is_conflict(&err) {
        let field = if err.to_string().contains("phone") {
            ContactField::Phone
        } else {
            ContactField::Email
        };
        DoctorError::DuplicateContactField { field }
    } else {
        DoctorError::DatabaseError(err.to_string())
    }
}

fn read_error(err: anyhow::Error) -> DoctorError {
    DoctorError::DatabaseError(err.to_string())
}

fn parse_first<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, DoctorError> {
    rows.into_iter()
        .next()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse row: {}", e)))
}

pub struct SupabaseDoctorStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseDoctorStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase, auth_token: None }
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }
}

#[async_trait]
impl DoctorStore for SupabaseDoctorStore {
    async fn get(&self, id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("{}?id=eq.{}", DOCTORS_PATH, id);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(read_error)?;
        parse_first(rows)
    }

    async fn insert(&self, doctor: &Doctor) -> Result<Doctor, DoctorError> {
        let body = serde_json::to_value(doctor)
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
        let rows = self.supabase
            .request_returning(Method::POST, DOCTORS_PATH, self.auth_token.as_deref(), body)
            .await
            .map_err(write_error)?;

        debug!("Doctor {} inserted", doctor.id);
        parse_first(rows)?.ok_or_else(|| DoctorError::DatabaseError("Store returned no rows".to_string()))
    }

    async fn update(&self, doctor: &Doctor) -> Result<Doctor, DoctorError> {
        let path = format!("{}?id=eq.{}", DOCTORS_PATH, doctor.id);
        let body = serde_json::to_value(doctor)
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
        let rows = self.supabase
            .request_returning(Method::PATCH, &path, self.auth_token.as_deref(), body)
            .await
            .map_err(write_error)?;

        parse_first(rows)?.ok_or(DoctorError::NotFound)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), DoctorError> {
        let path = format!("{}?id=eq.{}", DOCTORS_PATH, id);
        let _: Value = self.supabase
            .request(Method::PATCH, &path, self.auth_token.as_deref(), Some(json!({ "is_deleted": true })))
            .await
            .map_err(read_error)?;
        Ok(())
    }

    async fn contact_taken(
        &self,
        field: ContactField,
        value: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, DoctorError> {
        let mut path = format!(
            "{}?select=id&{}=eq.{}&is_deleted=eq.false&limit=1",
            DOCTORS_PATH,
            field.as_str(),
            urlencoding::encode(value),
        );
        if let Some(exclude_id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", exclude_id));
        }

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(read_error)?;
        Ok(!rows.is_empty())
    }
}

pub struct SupabaseEducationStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseEducationStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase, auth_token: None }
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }
}

#[async_trait]
impl EducationStore for SupabaseEducationStore {
    async fn get_for_doctor(&self, doctor_id: Uuid) -> Result<Option<Education>, DoctorError> {
        let path = format!("{}?doctor_id=eq.{}", EDUCATIONS_PATH, doctor_id);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(read_error)?;
        parse_first(rows)
    }

    async fn upsert_for_doctor(
        &self,
        doctor_id: Uuid,
        history: &EducationHistory,
    ) -> Result<Education, DoctorError> {
        let path = format!("{}?on_conflict=doctor_id", EDUCATIONS_PATH);
        let body = json!({
            "doctor_id": doctor_id,
            "history_education": history,
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let rows: Vec<Value> = self.supabase
            .request_with_headers(Method::POST, &path, self.auth_token.as_deref(), Some(body), Some(headers))
            .await
            .map_err(read_error)?;

        parse_first(rows)?.ok_or_else(|| DoctorError::DatabaseError("Store returned no rows".to_string()))
    }

    async fn delete_for_doctor(&self, doctor_id: Uuid) -> Result<(), DoctorError> {
        let path = format!("{}?doctor_id=eq.{}", EDUCATIONS_PATH, doctor_id);
        let _: Value = self.supabase
            .request(Method::DELETE, &path, self.auth_token.as_deref(), None)
            .await
            .map_err(read_error)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDoctorStore {
    rows: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn uses(doctor: &Doctor, field: ContactField, value: &str) -> bool {
        match field {
            ContactField::Email => doctor.email == value,
            ContactField::Phone => doctor.phone.as_deref() == Some(value),
        }
    }

    fn clash(rows: &HashMap<Uuid, Doctor>, candidate: &Doctor) -> Option<ContactField> {
        let others = || rows.values().filter(|d| d.id != candidate.id && !d.is_deleted);
        if others().any(|d| Self::uses(d, ContactField::Email, &candidate.email)) {
            return Some(ContactField::Email);
        }
        match candidate.phone.as_deref() {
            Some(phone) if others().any(|d| Self::uses(d, ContactField::Phone, phone)) => {
                Some(ContactField::Phone)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl DoctorStore for InMemoryDoctorStore {
    async fn get(&self, id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn insert(&self, doctor: &Doctor) -> Result<Doctor, DoctorError> {
        let mut rows = self.rows.write().await;
        if let Some(field) = Self::clash(&rows, doctor) {
            return Err(DoctorError::DuplicateContactField { field });
        }
        rows.insert(doctor.id, doctor.clone());
        Ok(doctor.clone())
    }

    async fn update(&self, doctor: &Doctor) -> Result<Doctor, DoctorError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&doctor.id) {
            return Err(DoctorError::NotFound);
        }
        if let Some(field) = Self::clash(&rows, doctor) {
            return Err(DoctorError::DuplicateContactField { field });
        }
        rows.insert(doctor.id, doctor.clone());
        Ok(doctor.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), DoctorError> {
        let mut rows = self.rows.write().await;
        let doctor = rows.get_mut(&id).ok_or(DoctorError::NotFound)?;
        doctor.is_deleted = true;
        Ok(())
    }

    async fn contact_taken(
        &self,
        field: ContactField,
        value: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, DoctorError> {
        Ok(self.rows.read().await.values().any(|d| {
            !d.is_deleted && Some(d.id) != exclude_id && Self::uses(d, field, value)
        }))
    }
}

#[derive(Default)]
pub struct InMemoryEducationStore {
    rows: RwLock<HashMap<Uuid, Education>>,
}

impl InMemoryEducationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EducationStore for InMemoryEducationStore {
    async fn get_for_doctor(&self, doctor_id: Uuid) -> Result<Option<Education>, DoctorError> {
        Ok(self.rows.read().await.get(&doctor_id).cloned())
    }

    async fn upsert_for_doctor(
        &self,
        doctor_id: Uuid,
        history: &EducationHistory,
    ) -> Result<Education, DoctorError> {
        let mut rows = self.rows.write().await;
        let education = rows.entry(doctor_id).or_insert_with(|| Education {
            id: Uuid::new_v4(),
            doctor_id,
            history_education: EducationHistory::default(),
        });
        education.history_education = history.clone();
        Ok(education.clone())
    }

    async fn delete_for_doctor(&self, doctor_id: Uuid) -> Result<(), DoctorError> {
        self.rows.write().await.remove(&doctor_id);
        Ok(())
    }
}
