use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub legal_address: String,
    pub physical_address: String,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Clinic together with the doctors attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicProfile {
    #[serde(flatten)]
    pub clinic: Clinic,
    pub doctor_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClinicRequest {
    pub name: String,
    pub legal_address: String,
    pub physical_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClinicError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Clinic not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<ClinicError> for AppError {
    fn from(err: ClinicError) -> Self {
        match err {
            ClinicError::MissingField(_) => AppError::ValidationError(err.to_string()),
            ClinicError::NotFound => AppError::NotFound(err.to_string()),
            ClinicError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
