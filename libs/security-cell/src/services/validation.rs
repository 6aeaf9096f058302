// =====================================================================================
// CONTACT VALIDATION - EMAIL & PHONE FORMAT CHECKS
// =====================================================================================

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ContactField, SecurityError};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[1-9]\d{6,14}$").expect("phone pattern compiles")
});

/// Lower-cases and trims; the result is what uniqueness is checked against.
pub fn validate_email(email: &str) -> Result<String, SecurityError> {
    let normalized = email.trim().to_lowercase();

    if normalized.len() > 254 || !EMAIL_REGEX.is_match(&normalized) {
        return Err(SecurityError::InvalidContact {
            field: ContactField::Email,
            value: email.to_string(),
        });
    }

    Ok(normalized)
}

/// Strips spaces, dashes, dots and brackets.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect()
}

pub fn validate_phone(phone: &str) -> Result<String, SecurityError> {
    let normalized = normalize_phone(phone.trim());

    if !PHONE_REGEX.is_match(&normalized) {
        return Err(SecurityError::InvalidContact {
            field: ContactField::Phone,
            value: phone.to_string(),
        });
    }

    Ok(normalized)
}
