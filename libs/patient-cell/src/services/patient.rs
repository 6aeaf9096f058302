use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use security_cell::{validate_email, validate_phone, ContactField, CredentialHasher};

use crate::models::{CreatePatientRequest, Patient, PatientError, UpdatePatientRequest};
use crate::services::store::PatientStore;

/// Accepts an empty handle or one starting with `@`.
pub fn validate_social_tag(tag: &str) -> Result<(), PatientError> {
    if tag.is_empty() || tag.starts_with('@') {
        Ok(())
    } else {
        Err(PatientError::InvalidSocialTag(tag.to_string()))
    }
}

pub struct PatientService {
    patients: Arc<dyn PatientStore>,
    hasher: Arc<dyn CredentialHasher>,
}

impl PatientService {
    pub fn new(patients: Arc<dyn PatientStore>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { patients, hasher }
    }

    pub async fn create_patient(&self, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        debug!("Registering patient: {}", request.email);

        if request.name.trim().is_empty() {
            return Err(PatientError::MissingField("name"));
        }
        if request.family_name.trim().is_empty() {
            return Err(PatientError::MissingField("family_name"));
        }
        // Registration needs a handle; only updates may clear it.
        if request.tag_social.is_empty() {
            return Err(PatientError::MissingField("tag_social"));
        }
        validate_social_tag(&request.tag_social)?;

        let email = validate_email(&request.email)?;
        let phone = request.phone.as_deref().map(validate_phone).transpose()?;
        self.ensure_contact_free(ContactField::Email, Some(&email), None).await?;
        self.ensure_contact_free(ContactField::Phone, phone.as_deref(), None).await?;

        let password_hash = self.hasher.hash_password(&request.password)?;

        let patient = Patient {
            id: Uuid::new_v4(),
            name: request.name,
            family_name: request.family_name,
            patronymic: request.patronymic,
            gender: request.gender,
            email,
            phone,
            password_hash,
            tag_social: request.tag_social,
            is_deleted: false,
        };

        let patient = self.patients.insert(&patient).await?;
        info!("Patient {} registered", patient.id);
        Ok(patient)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient {}", patient_id);

        let mut patient = self.get_patient(patient_id).await?;

        if request.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(PatientError::MissingField("name"));
        }
        if request.family_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(PatientError::MissingField("family_name"));
        }
        if let Some(tag_social) = &request.tag_social {
            validate_social_tag(tag_social)?;
        }

        let email = request.email.as_deref().map(validate_email).transpose()?;
        let phone = request.phone.as_deref().map(validate_phone).transpose()?;
        self.ensure_contact_free(ContactField::Email, email.as_deref(), Some(patient_id)).await?;
        self.ensure_contact_free(ContactField::Phone, phone.as_deref(), Some(patient_id)).await?;

        if let Some(name) = request.name {
            patient.name = name;
        }
        if let Some(family_name) = request.family_name {
            patient.family_name = family_name;
        }
        if request.patronymic.is_some() {
            patient.patronymic = request.patronymic;
        }
        if let Some(gender) = request.gender {
            patient.gender = gender;
        }
        if let Some(email) = email {
            patient.email = email;
        }
        if phone.is_some() {
            patient.phone = phone;
        }
        if let Some(tag_social) = request.tag_social {
            patient.tag_social = tag_social;
        }
        if let Some(password) = request.password {
            patient.password_hash = self.hasher.hash_password(&password)?;
        }

        let patient = self.patients.update(&patient).await?;
        info!("Patient {} updated", patient_id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, PatientError> {
        self.patients
            .get(patient_id)
            .await?
            .filter(|p| !p.is_deleted)
            .ok_or(PatientError::NotFound)
    }

    pub async fn delete_patient(&self, patient_id: Uuid) -> Result<(), PatientError> {
        self.get_patient(patient_id).await?;
        self.patients.soft_delete(patient_id).await?;
        info!("Patient {} marked as deleted", patient_id);
        Ok(())
    }

    async fn ensure_contact_free(
        &self,
        field: ContactField,
        value: Option<&str>,
        exclude_id: Option<Uuid>,
    ) -> Result<(), PatientError> {
        let Some(value) = value else {
            return Ok(());
        };
        if self.patients.contact_taken(field, value, exclude_id).await? {
            warn!("Rejected patient write: {} already in use", field);
            return Err(PatientError::DuplicateContactField { field });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn social_tag_must_be_empty_or_start_with_at() {
        assert!(validate_social_tag("").is_ok());
        assert!(validate_social_tag("@ivan").is_ok());
        assert!(validate_social_tag("@").is_ok());
        assert_matches!(validate_social_tag("ivan"), Err(PatientError::InvalidSocialTag(t)) if t == "ivan");
        assert_matches!(validate_social_tag(" @ivan"), Err(PatientError::InvalidSocialTag(_)));
    }
}
