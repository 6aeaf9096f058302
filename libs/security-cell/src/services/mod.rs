pub mod password;
pub mod validation;

pub use password::{CredentialHasher, PasswordSecurityService};
pub use validation::{normalize_phone, validate_email, validate_phone};
