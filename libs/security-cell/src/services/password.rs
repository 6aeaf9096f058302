// =====================================================================================
// PASSWORD SECURITY SERVICE - ONE-WAY CREDENTIAL HASHING
// =====================================================================================

use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use tracing::{debug, instrument};

use crate::models::SecurityError;

/// Hash/verify seam so services can be tested with cheap parameters.
pub trait CredentialHasher: Send + Sync {
    fn hash_password(&self, password: &str) -> Result<String, SecurityError>;

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, SecurityError>;
}

pub struct PasswordSecurityService {
    argon2: Argon2<'static>,
}

impl Default for PasswordSecurityService {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordSecurityService {
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Minimal-cost parameters for tests and fixtures. Never use for real credentials.
    pub fn low_cost() -> Self {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
            .unwrap_or_default();
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl CredentialHasher for PasswordSecurityService {
    #[instrument(skip(self, password))]
    fn hash_password(&self, password: &str) -> Result<String, SecurityError> {
        if password.is_empty() {
            return Err(SecurityError::EmptyPassword);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| SecurityError::Hashing(e.to_string()))?;

        debug!("Password hashed");
        Ok(password_hash.to_string())
    }

    #[instrument(skip(self, password, hash))]
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, SecurityError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| SecurityError::MalformedHash(e.to_string()))?;

        // Parameters come from the stored hash, not from self.
        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(SecurityError::Hashing(e.to_string())),
        }
    }
}
