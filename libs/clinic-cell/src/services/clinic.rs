use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Clinic, ClinicError, ClinicProfile, CreateClinicRequest};
use crate::services::store::ClinicStore;

pub struct ClinicService {
    store: Arc<dyn ClinicStore>,
}

impl ClinicService {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    pub async fn create_clinic(&self, request: CreateClinicRequest) -> Result<Clinic, ClinicError> {
        let required = [
            ("name", &request.name),
            ("legal_address", &request.legal_address),
            ("physical_address", &request.physical_address),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ClinicError::MissingField(*field));
        }

        let clinic = Clinic {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            legal_address: request.legal_address.trim().to_string(),
            physical_address: request.physical_address.trim().to_string(),
            is_deleted: false,
        };

        let clinic = self.store.insert(&clinic).await?;
        info!("Clinic {} created", clinic.id);
        Ok(clinic)
    }

    pub async fn get_clinic(&self, clinic_id: Uuid) -> Result<ClinicProfile, ClinicError> {
        let clinic = self.active_clinic(clinic_id).await?;
        let doctor_ids = self.store.doctor_ids(clinic_id).await?;
        Ok(ClinicProfile { clinic, doctor_ids })
    }

    pub async fn attach_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<(), ClinicError> {
        self.active_clinic(clinic_id).await?;
        self.store.attach_doctor(clinic_id, doctor_id).await?;
        debug!("Doctor {} attached to clinic {}", doctor_id, clinic_id);
        Ok(())
    }

    pub async fn detach_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<(), ClinicError> {
        self.active_clinic(clinic_id).await?;
        self.store.detach_doctor(clinic_id, doctor_id).await
    }

    pub async fn delete_clinic(&self, clinic_id: Uuid) -> Result<(), ClinicError> {
        self.active_clinic(clinic_id).await?;
        self.store.soft_delete(clinic_id).await?;
        info!("Clinic {} marked as deleted", clinic_id);
        Ok(())
    }

    async fn active_clinic(&self, clinic_id: Uuid) -> Result<Clinic, ClinicError> {
        match self.store.get(clinic_id).await? {
            Some(clinic) if !clinic.is_deleted => Ok(clinic),
            _ => Err(ClinicError::NotFound),
        }
    }
}
