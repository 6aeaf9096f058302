use serde::{Deserialize, Serialize};
use uuid::Uuid;

use security_cell::{ContactField, SecurityError};
use shared_models::error::AppError;
pub use shared_models::person::Gender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub family_name: String,
    pub patronymic: Option<String>,
    pub gender: Gender,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    /// Social-network handle, empty or starting with `@`.
    pub tag_social: String,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Patient {
    pub fn display_name(&self) -> String {
        match self.patronymic.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(patronymic) => format!("{} {} {}", self.family_name, self.name, patronymic),
            None => format!("{} {}", self.family_name, self.name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub family_name: String,
    pub patronymic: Option<String>,
    pub gender: Gender,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub tag_social: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub family_name: Option<String>,
    pub patronymic: Option<String>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub tag_social: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatientError {
    #[error("Social tag '{0}' must start with '@'")]
    InvalidSocialTag(String),

    #[error("A patient with this {field} is already registered")]
    DuplicateContactField { field: ContactField },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("Patient not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match &err {
            PatientError::DuplicateContactField { .. } => AppError::Conflict(err.to_string()),
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::DatabaseError(msg) => AppError::Database(msg.clone()),
            PatientError::Security(SecurityError::Hashing(msg)) => AppError::Internal(msg.clone()),
            _ => AppError::ValidationError(err.to_string()),
        }
    }
}
