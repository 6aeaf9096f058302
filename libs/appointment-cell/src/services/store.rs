use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{is_conflict, SupabaseClient};

use crate::models::{AppointmentError, Consultation};

const CONSULTATIONS_PATH: &str = "/rest/v1/consultations";

/// Data access for consultations. Implementations must reject a second
/// active row with the same `(doctor_id, start_time)` as `SchedulingConflict`.
#[async_trait]
pub trait ConsultationStore: Send + Sync {
    /// Active consultations of `doctor_id` with `start_time < end && end_time > start`.
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Consultation>, AppointmentError>;

    async fn get(&self, id: Uuid) -> Result<Option<Consultation>, AppointmentError>;

    async fn insert(&self, consultation: &Consultation) -> Result<Consultation, AppointmentError>;

    async fn update(&self, consultation: &Consultation) -> Result<Consultation, AppointmentError>;

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppointmentError>;
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_rows(rows: Vec<Value>) -> Result<Vec<Consultation>, AppointmentError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Consultation>, _>>()
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse consultations: {}", e)))
}

fn first_row(rows: Vec<Value>) -> Result<Consultation, AppointmentError> {
    parse_rows(rows)?
        .into_iter()
        .next()
        .ok_or_else(|| AppointmentError::DatabaseError("Store returned no rows".to_string()))
}

fn write_error(err: anyhow::Error, consultation: &Consultation) -> AppointmentError {
    if is_conflict(&err) {
        AppointmentError::SchedulingConflict {
            doctor_id: consultation.doctor_id,
            start: consultation.start_time,
            end: consultation.end_time,
        }
    } else {
        AppointmentError::DatabaseError(err.to_string())
    }
}

/// PostgREST-backed store. The `consultations` table carries a unique index on
/// `(doctor_id, start_time) WHERE NOT is_deleted`.
pub struct SupabaseConsultationStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseConsultationStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase, auth_token: None }
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

#[async_trait]
impl ConsultationStore for SupabaseConsultationStore {
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Consultation>, AppointmentError> {
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            "is_deleted=eq.false".to_string(),
            format!("start_time=lt.{}", timestamp(end)),
            format!("end_time=gt.{}", timestamp(start)),
        ];

        if let Some(exclude_id) = exclude_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("{}?{}&order=start_time.asc", CONSULTATIONS_PATH, query_parts.join("&"));

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        parse_rows(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Consultation>, AppointmentError> {
        let path = format!("{}?id=eq.{}", CONSULTATIONS_PATH, id);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(parse_rows(rows)?.into_iter().next())
    }

    async fn insert(&self, consultation: &Consultation) -> Result<Consultation, AppointmentError> {
        let body = serde_json::to_value(consultation)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let rows = self.supabase
            .request_returning(Method::POST, CONSULTATIONS_PATH, self.token(), body)
            .await
            .map_err(|e| write_error(e, consultation))?;

        debug!("Consultation {} inserted", consultation.id);
        first_row(rows)
    }

    async fn update(&self, consultation: &Consultation) -> Result<Consultation, AppointmentError> {
        let path = format!("{}?id=eq.{}", CONSULTATIONS_PATH, consultation.id);
        let body = json!({
            "doctor_id": consultation.doctor_id,
            "patient_id": consultation.patient_id,
            "clinic_id": consultation.clinic_id,
            "start_time": timestamp(consultation.start_time),
            "end_time": timestamp(consultation.end_time),
            "updated_at": timestamp(consultation.updated_at),
            "is_deleted": consultation.is_deleted,
        });

        let rows = self.supabase
            .request_returning(Method::PATCH, &path, self.token(), body)
            .await
            .map_err(|e| write_error(e, consultation))?;

        if rows.is_empty() {
            return Err(AppointmentError::NotFound);
        }
        first_row(rows)
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppointmentError> {
        let path = format!("{}?id=eq.{}", CONSULTATIONS_PATH, id);
        let body = json!({
            "is_deleted": true,
            "updated_at": timestamp(at),
        });

        let _: Value = self.supabase
            .request(Method::PATCH, &path, self.token(), Some(body))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

/// Process-local store used by tests and local tooling.
#[derive(Default)]
pub struct InMemoryConsultationStore {
    rows: RwLock<HashMap<Uuid, Consultation>>,
}

impl InMemoryConsultationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Consultation> {
        let mut rows: Vec<Consultation> = self.rows.read().await.values().cloned().collect();
        rows.sort_by_key(|c| c.start_time);
        rows
    }

    fn start_taken(rows: &HashMap<Uuid, Consultation>, candidate: &Consultation) -> bool {
        rows.values().any(|c| {
            c.id != candidate.id
                && !c.is_deleted
                && !candidate.is_deleted
                && c.doctor_id == candidate.doctor_id
                && c.start_time == candidate.start_time
        })
    }
}

#[async_trait]
impl ConsultationStore for InMemoryConsultationStore {
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Consultation>, AppointmentError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Consultation> = rows.values()
            .filter(|c| c.doctor_id == doctor_id && !c.is_deleted)
            .filter(|c| Some(c.id) != exclude_id)
            .filter(|c| c.overlaps(start, end))
            .cloned()
            .collect();
        found.sort_by_key(|c| c.start_time);
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Consultation>, AppointmentError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn insert(&self, consultation: &Consultation) -> Result<Consultation, AppointmentError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&consultation.id) {
            return Err(AppointmentError::DatabaseError(format!(
                "Consultation {} already exists", consultation.id
            )));
        }
        if Self::start_taken(&rows, consultation) {
            return Err(AppointmentError::SchedulingConflict {
                doctor_id: consultation.doctor_id,
                start: consultation.start_time,
                end: consultation.end_time,
            });
        }
        rows.insert(consultation.id, consultation.clone());
        Ok(consultation.clone())
    }

    async fn update(&self, consultation: &Consultation) -> Result<Consultation, AppointmentError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&consultation.id) {
            return Err(AppointmentError::NotFound);
        }
        if Self::start_taken(&rows, consultation) {
            return Err(AppointmentError::SchedulingConflict {
                doctor_id: consultation.doctor_id,
                start: consultation.start_time,
                end: consultation.end_time,
            });
        }
        rows.insert(consultation.id, consultation.clone());
        Ok(consultation.clone())
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppointmentError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(row) => {
                row.is_deleted = true;
                row.updated_at = at;
                Ok(())
            }
            None => Err(AppointmentError::NotFound),
        }
    }
}
