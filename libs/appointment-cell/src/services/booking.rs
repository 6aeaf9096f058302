use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    AppointmentError, BookConsultationRequest, Consultation, RescheduleConsultationRequest,
    SlotRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::store::ConsultationStore;

/// One async lock per doctor so the overlap check and the write happen as a unit.
#[derive(Default)]
pub struct DoctorLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl DoctorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, doctor_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries nobody holds or waits on can go.
            locks.retain(|id, lock| *id == doctor_id || Arc::strong_count(lock) > 1);
            locks.entry(doctor_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

pub struct ConsultationBookingService {
    store: Arc<dyn ConsultationStore>,
    conflicts: ConflictDetectionService,
    locks: DoctorLocks,
}

impl ConsultationBookingService {
    pub fn new(store: Arc<dyn ConsultationStore>) -> Self {
        Self {
            conflicts: ConflictDetectionService::new(store.clone()),
            store,
            locks: DoctorLocks::new(),
        }
    }

    pub async fn book(&self, request: BookConsultationRequest) -> Result<Consultation, AppointmentError> {
        debug!("Booking consultation for doctor {} at {}", request.doctor_id, request.start_time);

        let _guard = self.locks.acquire(request.doctor_id).await;

        let slot = self.conflicts.admit(&SlotRequest {
            doctor_id: request.doctor_id,
            start_time: request.start_time,
            end_time: request.end_time,
            self_id: None,
        }).await?;

        let now = Utc::now();
        let consultation = Consultation {
            id: Uuid::new_v4(),
            doctor_id: slot.doctor_id,
            patient_id: request.patient_id,
            clinic_id: request.clinic_id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };

        let stored = self.store.insert(&consultation).await?;
        info!("Consultation {} booked for doctor {} ({} - {})",
              stored.id, stored.doctor_id, stored.start_time, stored.end_time);
        Ok(stored)
    }

    pub async fn reschedule(
        &self,
        consultation_id: Uuid,
        request: RescheduleConsultationRequest,
    ) -> Result<Consultation, AppointmentError> {
        let current = self.active(consultation_id).await?;
        let _guard = self.locks.acquire(current.doctor_id).await;

        // Re-read under the lock; a concurrent cancel may have landed.
        let current = self.active(consultation_id).await?;

        let slot = self.conflicts.admit(&SlotRequest {
            doctor_id: current.doctor_id,
            start_time: request.start_time,
            end_time: request.end_time,
            self_id: Some(current.id),
        }).await?;

        let updated = Consultation {
            start_time: slot.start_time,
            end_time: slot.end_time,
            updated_at: Utc::now(),
            ..current
        };

        let stored = self.store.update(&updated).await?;
        info!("Consultation {} rescheduled to {} - {}", stored.id, stored.start_time, stored.end_time);
        Ok(stored)
    }

    /// Soft-deletes the consultation. Cancelling twice is a no-op.
    pub async fn cancel(&self, consultation_id: Uuid) -> Result<(), AppointmentError> {
        let current = self.store.get(consultation_id).await?
            .ok_or(AppointmentError::NotFound)?;

        if current.is_deleted {
            debug!("Consultation {} already cancelled", consultation_id);
            return Ok(());
        }

        self.store.soft_delete(consultation_id, Utc::now()).await?;
        info!("Consultation {} cancelled", consultation_id);
        Ok(())
    }

    pub async fn get(&self, consultation_id: Uuid) -> Result<Consultation, AppointmentError> {
        self.store.get(consultation_id).await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn active(&self, consultation_id: Uuid) -> Result<Consultation, AppointmentError> {
        match self.store.get(consultation_id).await? {
            Some(c) if !c.is_deleted => Ok(c),
            _ => Err(AppointmentError::NotFound),
        }
    }
}
