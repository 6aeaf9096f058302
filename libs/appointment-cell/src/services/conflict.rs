use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{default_consultation_length, AdmittedSlot, AppointmentError, Consultation, SlotRequest};
use crate::services::store::ConsultationStore;

/// Applies the default slot length and rejects intervals that end before they start.
pub fn normalize_interval(
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AppointmentError> {
    let end_time = match end_time {
        Some(end_time) => end_time,
        None => start_time
            .checked_add_signed(default_consultation_length())
            .ok_or_else(|| AppointmentError::InvalidInterval {
                start: start_time,
                reason: "default end_time is out of range".to_string(),
            })?,
    };

    if end_time < start_time {
        return Err(AppointmentError::InvalidInterval {
            start: start_time,
            reason: format!("end_time {} is earlier than start_time", end_time),
        });
    }

    Ok((start_time, end_time))
}

pub struct ConflictDetectionService {
    store: Arc<dyn ConsultationStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn ConsultationStore>) -> Self {
        Self { store }
    }

    /// Active consultations of the doctor that intersect `[start_time, end_time)`.
    pub async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_consultation_id: Option<Uuid>,
    ) -> Result<Vec<Consultation>, AppointmentError> {
        debug!("Checking conflicts for doctor {} from {} to {}",
               doctor_id, start_time, end_time);

        let existing = self.store
            .find_overlapping(doctor_id, start_time, end_time, exclude_consultation_id)
            .await?;

        let conflicting: Vec<Consultation> = existing.into_iter()
            .filter(|c| !c.is_deleted && Some(c.id) != exclude_consultation_id)
            .filter(|c| c.overlaps(start_time, end_time))
            .collect();

        if !conflicting.is_empty() {
            warn!("Conflict detected for doctor {} - {} conflicting consultations",
                  doctor_id, conflicting.len());
        }

        Ok(conflicting)
    }

    /// Decides whether a slot may be persisted. Does not write anything.
    pub async fn admit(&self, request: &SlotRequest) -> Result<AdmittedSlot, AppointmentError> {
        let (start_time, end_time) = normalize_interval(request.start_time, request.end_time)?;

        let conflicting = self
            .check_conflicts(request.doctor_id, start_time, end_time, request.self_id)
            .await?;

        if !conflicting.is_empty() {
            return Err(AppointmentError::SchedulingConflict {
                doctor_id: request.doctor_id,
                start: start_time,
                end: end_time,
            });
        }

        Ok(AdmittedSlot {
            doctor_id: request.doctor_id,
            start_time,
            end_time,
        })
    }
}
