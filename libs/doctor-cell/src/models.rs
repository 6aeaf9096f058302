use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use security_cell::{ContactField, SecurityError};
use shared_models::error::AppError;
pub use shared_models::person::Gender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub family_name: String,
    pub patronymic: Option<String>,
    pub gender: Gender,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub date_of_birth: NaiveDate,
    pub start_of_work: NaiveDate,
    pub end_of_work: Option<NaiveDate>,
    pub salary: i64,
    pub specialty: String,
    pub years_of_experience: i32,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Doctor {
    /// "Family Name Patronymic", patronymic omitted when absent.
    pub fn display_name(&self) -> String {
        match self.patronymic.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(patronymic) => format!("{} {} {}", self.family_name, self.name, patronymic),
            None => format!("{} {}", self.family_name, self.name),
        }
    }
}

/// One entry of a university, residency or advanced-training list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationItem {
    pub name: String,
    pub specialty: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationHistory {
    pub universities: Vec<EducationItem>,
    pub ordinator: Vec<EducationItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_training: Option<Vec<EducationItem>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub history_education: EducationHistory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub family_name: String,
    pub patronymic: Option<String>,
    pub gender: Gender,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub date_of_birth: NaiveDate,
    pub start_of_work: NaiveDate,
    pub end_of_work: Option<NaiveDate>,
    pub salary: i64,
    pub specialty: String,
    pub years_of_experience: i32,
    /// Raw education payload; validated before anything is written.
    pub education: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub family_name: Option<String>,
    /// Absent: keep. `null`: clear.
    #[serde(default, deserialize_with = "explicit_null")]
    pub patronymic: Option<Option<String>>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub start_of_work: Option<NaiveDate>,
    /// Absent: keep. `null`: the doctor is employed again.
    #[serde(default, deserialize_with = "explicit_null")]
    pub end_of_work: Option<Option<NaiveDate>>,
    pub salary: Option<i64>,
    pub specialty: Option<String>,
    pub years_of_experience: Option<i32>,
    /// Absent: keep. `null`: remove the education record. Object: replace it.
    #[serde(default, deserialize_with = "explicit_null")]
    pub education: Option<Option<Value>>,
}

/// Lets a present `null` be told apart from a missing key.
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DoctorError {
    #[error("Malformed education payload at '{location}': {reason}")]
    MalformedEducationPayload { location: String, reason: String },

    #[error("A doctor with this {field} is already registered")]
    DuplicateContactField { field: ContactField },

    #[error("Invalid employment dates: {0}")]
    InvalidEmploymentDates(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("Doctor not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl DoctorError {
    pub(crate) fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        DoctorError::MalformedEducationPayload {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match &err {
            DoctorError::DuplicateContactField { .. } => AppError::Conflict(err.to_string()),
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::DatabaseError(msg) => AppError::Database(msg.clone()),
            DoctorError::Security(SecurityError::Hashing(msg)) => AppError::Internal(msg.clone()),
            _ => AppError::ValidationError(err.to_string()),
        }
    }
}
