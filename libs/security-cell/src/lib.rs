// =====================================================================================
// SECURITY CELL - CREDENTIAL HASHING & CONTACT VALIDATION
// =====================================================================================

pub mod models;
pub mod services;

pub use models::{ContactField, SecurityError};

pub use services::{
    CredentialHasher, PasswordSecurityService,
    validate_email, validate_phone, normalize_phone,
};
