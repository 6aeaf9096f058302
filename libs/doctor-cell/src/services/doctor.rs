use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use security_cell::{validate_email, validate_phone, ContactField, CredentialHasher};

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, Education, EducationHistory, UpdateDoctorRequest,
};
use crate::services::education::validate_education_payload;
use crate::services::store::{DoctorStore, EducationStore};

/// `date_of_birth <= start_of_work <= end_of_work`, the end being optional.
pub fn validate_employment_dates(
    date_of_birth: NaiveDate,
    start_of_work: NaiveDate,
    end_of_work: Option<NaiveDate>,
) -> Result<(), DoctorError> {
    if date_of_birth > start_of_work {
        return Err(DoctorError::InvalidEmploymentDates(format!(
            "start_of_work {} is earlier than date_of_birth {}",
            start_of_work, date_of_birth
        )));
    }

    if let Some(end_of_work) = end_of_work {
        if start_of_work > end_of_work {
            return Err(DoctorError::InvalidEmploymentDates(format!(
                "end_of_work {} is earlier than start_of_work {}",
                end_of_work, start_of_work
            )));
        }
    }

    Ok(())
}

fn require_non_blank(value: &str, field: &'static str) -> Result<(), DoctorError> {
    if value.trim().is_empty() {
        return Err(DoctorError::MissingField(field));
    }
    Ok(())
}

pub struct DoctorService {
    doctors: Arc<dyn DoctorStore>,
    educations: Arc<dyn EducationStore>,
    hasher: Arc<dyn CredentialHasher>,
}

impl DoctorService {
    pub fn new(
        doctors: Arc<dyn DoctorStore>,
        educations: Arc<dyn EducationStore>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self { doctors, educations, hasher }
    }

    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
    ) -> Result<(Doctor, Option<Education>), DoctorError> {
        debug!("Creating doctor profile for: {}", request.email);

        require_non_blank(&request.name, "name")?;
        require_non_blank(&request.family_name, "family_name")?;
        validate_employment_dates(request.date_of_birth, request.start_of_work, request.end_of_work)?;

        let history = request.education
            .as_ref()
            .map(validate_education_payload)
            .transpose()?;

        let email = validate_email(&request.email)?;
        let phone = request.phone.as_deref().map(validate_phone).transpose()?;
        self.ensure_contacts_free(&email, phone.as_deref(), None).await?;

        let password_hash = self.hasher.hash_password(&request.password)?;

        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: request.name,
            family_name: request.family_name,
            patronymic: request.patronymic,
            gender: request.gender,
            email,
            phone,
            password_hash,
            date_of_birth: request.date_of_birth,
            start_of_work: request.start_of_work,
            end_of_work: request.end_of_work,
            salary: request.salary,
            specialty: request.specialty,
            years_of_experience: request.years_of_experience,
            is_deleted: false,
        };

        let doctor = self.doctors.insert(&doctor).await?;

        // The doctor row goes first so the education row has something to reference.
        // If the second write fails, the doctor is retired again and its contacts freed.
        let education = match history {
            Some(history) => match self.educations.upsert_for_doctor(doctor.id, &history).await {
                Ok(education) => Some(education),
                Err(err) => {
                    warn!("Education write failed for doctor {}, rolling back: {}", doctor.id, err);
                    self.doctors.soft_delete(doctor.id).await?;
                    return Err(err);
                }
            },
            None => None,
        };

        info!("Doctor {} created", doctor.id);
        Ok((doctor, education))
    }

    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        let mut doctor = self.get_doctor(doctor_id).await?;

        // Validate the education change up front so a bad payload writes nothing.
        let education_change: Option<Option<EducationHistory>> = match &request.education {
            None => None,
            Some(None) => Some(None),
            Some(Some(payload)) => Some(Some(validate_education_payload(payload)?)),
        };

        if let Some(name) = request.name {
            require_non_blank(&name, "name")?;
            doctor.name = name;
        }
        if let Some(family_name) = request.family_name {
            require_non_blank(&family_name, "family_name")?;
            doctor.family_name = family_name;
        }
        if let Some(patronymic) = request.patronymic {
            doctor.patronymic = patronymic;
        }
        if let Some(gender) = request.gender {
            doctor.gender = gender;
        }
        if let Some(date_of_birth) = request.date_of_birth {
            doctor.date_of_birth = date_of_birth;
        }
        if let Some(start_of_work) = request.start_of_work {
            doctor.start_of_work = start_of_work;
        }
        if let Some(end_of_work) = request.end_of_work {
            doctor.end_of_work = end_of_work;
        }
        if let Some(salary) = request.salary {
            doctor.salary = salary;
        }
        if let Some(specialty) = request.specialty {
            doctor.specialty = specialty;
        }
        if let Some(years_of_experience) = request.years_of_experience {
            doctor.years_of_experience = years_of_experience;
        }

        validate_employment_dates(doctor.date_of_birth, doctor.start_of_work, doctor.end_of_work)?;

        let email = request.email.as_deref().map(validate_email).transpose()?;
        let phone = request.phone.as_deref().map(validate_phone).transpose()?;
        self.ensure_contacts_free(
            email.as_deref().unwrap_or(""),
            phone.as_deref(),
            Some(doctor_id),
        ).await?;
        if let Some(email) = email {
            doctor.email = email;
        }
        if let Some(phone) = phone {
            doctor.phone = Some(phone);
        }

        if let Some(password) = request.password {
            doctor.password_hash = self.hasher.hash_password(&password)?;
        }

        let doctor = self.doctors.update(&doctor).await?;

        match education_change {
            None => {}
            Some(None) => self.educations.delete_for_doctor(doctor_id).await?,
            Some(Some(history)) => {
                self.educations.upsert_for_doctor(doctor_id, &history).await?;
            }
        }

        info!("Doctor {} updated", doctor_id);
        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        match self.doctors.get(doctor_id).await? {
            Some(doctor) if !doctor.is_deleted => Ok(doctor),
            _ => Err(DoctorError::NotFound),
        }
    }

    pub async fn get_education(&self, doctor_id: Uuid) -> Result<Option<Education>, DoctorError> {
        self.get_doctor(doctor_id).await?;
        self.educations.get_for_doctor(doctor_id).await
    }

    pub async fn delete_doctor(&self, doctor_id: Uuid) -> Result<(), DoctorError> {
        self.get_doctor(doctor_id).await?;
        self.doctors.soft_delete(doctor_id).await?;
        info!("Doctor {} marked as deleted", doctor_id);
        Ok(())
    }

    /// Empty `email` skips the email check.
    async fn ensure_contacts_free(
        &self,
        email: &str,
        phone: Option<&str>,
        exclude_id: Option<Uuid>,
    ) -> Result<(), DoctorError> {
        if !email.is_empty() && self.doctors.contact_taken(ContactField::Email, email, exclude_id).await? {
            return Err(DoctorError::DuplicateContactField { field: ContactField::Email });
        }
        if let Some(phone) = phone {
            if self.doctors.contact_taken(ContactField::Phone, phone, exclude_id).await? {
                return Err(DoctorError::DuplicateContactField { field: ContactField::Phone });
            }
        }
        Ok(())
    }
}
