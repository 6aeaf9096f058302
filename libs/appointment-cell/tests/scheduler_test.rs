// libs/appointment-cell/tests/scheduler_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use shared_utils::telemetry::init_tracing;

use appointment_cell::models::{
    AppointmentError, BookConsultationRequest, RescheduleConsultationRequest, SlotRequest,
};
use appointment_cell::services::{
    ConflictDetectionService, ConsultationBookingService, ConsultationStore,
    InMemoryConsultationStore,
};

// ==============================================================================
// FIXTURES
// ==============================================================================

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 20, hour, minute, 0).unwrap()
}

struct TestSetup {
    store: Arc<InMemoryConsultationStore>,
    service: ConsultationBookingService,
    doctor_id: Uuid,
}

impl TestSetup {
    fn new() -> Self {
        init_tracing();
        let store = Arc::new(InMemoryConsultationStore::new());
        let service = ConsultationBookingService::new(store.clone());
        Self {
            store,
            service,
            doctor_id: Uuid::new_v4(),
        }
    }

    fn request(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> BookConsultationRequest {
        BookConsultationRequest {
            doctor_id: self.doctor_id,
            patient_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
        }
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn test_back_to_back_slots_do_not_conflict() {
    let setup = TestSetup::new();

    setup.service.book(setup.request(at(10, 0), Some(at(10, 4)))).await
        .expect("first booking should succeed");
    let second = setup.service.book(setup.request(at(10, 4), Some(at(10, 8)))).await;

    assert!(second.is_ok(), "adjacent slot should be admitted: {:?}", second);
    assert_eq!(setup.store.all().await.len(), 2);
}

#[tokio::test]
async fn test_partial_overlap_is_a_conflict() {
    let setup = TestSetup::new();

    setup.service.book(setup.request(at(10, 0), Some(at(10, 5)))).await
        .expect("first booking should succeed");
    let second = setup.service.book(setup.request(at(10, 2), Some(at(10, 10)))).await;

    assert_matches!(second, Err(AppointmentError::SchedulingConflict { start, end, .. }) => {
        assert_eq!(start, at(10, 2));
        assert_eq!(end, at(10, 10));
    });
    assert_eq!(setup.store.all().await.len(), 1, "rejected booking must not be written");
}

#[tokio::test]
async fn test_enclosing_slot_is_a_conflict() {
    let setup = TestSetup::new();

    setup.service.book(setup.request(at(11, 10), Some(at(11, 20)))).await.unwrap();
    let result = setup.service.book(setup.request(at(11, 0), Some(at(12, 0)))).await;

    assert_matches!(result, Err(AppointmentError::SchedulingConflict { .. }));
}

#[tokio::test]
async fn test_missing_end_time_defaults_to_four_minutes() {
    let setup = TestSetup::new();

    let booked = setup.service.book(setup.request(at(9, 0), None)).await.unwrap();

    assert_eq!(booked.start_time, at(9, 0));
    assert_eq!(booked.end_time, at(9, 4));
}

#[tokio::test]
async fn test_end_before_start_is_invalid_regardless_of_schedule() {
    let setup = TestSetup::new();
    setup.service.book(setup.request(at(10, 0), Some(at(10, 30)))).await.unwrap();

    let overlapping_and_inverted = setup.service.book(setup.request(at(10, 20), Some(at(10, 10)))).await;
    let free_and_inverted = setup.service.book(setup.request(at(15, 20), Some(at(15, 10)))).await;

    assert_matches!(overlapping_and_inverted, Err(AppointmentError::InvalidInterval { .. }));
    assert_matches!(free_and_inverted, Err(AppointmentError::InvalidInterval { .. }));
}

#[tokio::test]
async fn test_other_doctors_schedule_is_ignored() {
    let setup = TestSetup::new();
    setup.service.book(setup.request(at(10, 0), Some(at(10, 30)))).await.unwrap();

    let mut other = setup.request(at(10, 0), Some(at(10, 30)));
    other.doctor_id = Uuid::new_v4();

    assert!(setup.service.book(other).await.is_ok());
}

#[tokio::test]
async fn test_same_doctor_different_clinic_still_conflicts() {
    let setup = TestSetup::new();
    setup.service.book(setup.request(at(10, 0), Some(at(10, 30)))).await.unwrap();

    // request() picks a fresh clinic each time
    let result = setup.service.book(setup.request(at(10, 15), Some(at(10, 45)))).await;

    assert_matches!(result, Err(AppointmentError::SchedulingConflict { .. }));
}

// ==============================================================================
// RESCHEDULE / CANCEL
// ==============================================================================

#[tokio::test]
async fn test_reschedule_does_not_conflict_with_itself() {
    let setup = TestSetup::new();
    let booked = setup.service.book(setup.request(at(10, 0), Some(at(10, 30)))).await.unwrap();

    let moved = setup.service.reschedule(booked.id, RescheduleConsultationRequest {
        start_time: at(10, 15),
        end_time: Some(at(10, 45)),
    }).await.expect("overlapping only with itself");

    assert_eq!(moved.id, booked.id);
    assert_eq!(moved.start_time, at(10, 15));
    assert_eq!(moved.end_time, at(10, 45));
    assert_eq!(moved.created_at, booked.created_at);
    assert!(moved.updated_at >= booked.updated_at);
}

#[tokio::test]
async fn test_reschedule_into_taken_slot_fails() {
    let setup = TestSetup::new();
    setup.service.book(setup.request(at(10, 0), Some(at(10, 30)))).await.unwrap();
    let second = setup.service.book(setup.request(at(11, 0), None)).await.unwrap();

    let result = setup.service.reschedule(second.id, RescheduleConsultationRequest {
        start_time: at(10, 29),
        end_time: None,
    }).await;

    assert_matches!(result, Err(AppointmentError::SchedulingConflict { .. }));
    let unchanged = setup.service.get(second.id).await.unwrap();
    assert_eq!(unchanged.start_time, at(11, 0));
}

#[tokio::test]
async fn test_cancelled_consultation_frees_the_slot() {
    let setup = TestSetup::new();
    let booked = setup.service.book(setup.request(at(10, 0), Some(at(10, 30)))).await.unwrap();

    setup.service.cancel(booked.id).await.unwrap();
    setup.service.cancel(booked.id).await.expect("second cancel is a no-op");

    let rebooked = setup.service.book(setup.request(at(10, 0), Some(at(10, 30)))).await;
    assert!(rebooked.is_ok(), "cancelled slot should be bookable: {:?}", rebooked);

    let stored = setup.service.get(booked.id).await.unwrap();
    assert!(stored.is_deleted, "cancel must only flag the row");
}

#[tokio::test]
async fn test_reschedule_of_cancelled_consultation_is_not_found() {
    let setup = TestSetup::new();
    let booked = setup.service.book(setup.request(at(10, 0), None)).await.unwrap();
    setup.service.cancel(booked.id).await.unwrap();

    let result = setup.service.reschedule(booked.id, RescheduleConsultationRequest {
        start_time: at(12, 0),
        end_time: None,
    }).await;

    assert_matches!(result, Err(AppointmentError::NotFound));
    assert_matches!(setup.service.cancel(Uuid::new_v4()).await, Err(AppointmentError::NotFound));
}

// ==============================================================================
// VALIDATOR WITHOUT BOOKING
// ==============================================================================

#[tokio::test]
async fn test_admit_has_no_side_effects() {
    let store = Arc::new(InMemoryConsultationStore::new());
    let validator = ConflictDetectionService::new(store.clone());
    let doctor_id = Uuid::new_v4();

    let slot = validator.admit(&SlotRequest {
        doctor_id,
        start_time: at(8, 0),
        end_time: None,
        self_id: None,
    }).await.unwrap();

    assert_eq!(slot.end_time, at(8, 4));
    assert!(store.find_overlapping(doctor_id, at(0, 0), at(23, 59), None).await.unwrap().is_empty());
}

// ==============================================================================
// CONCURRENCY
// ==============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overlapping_bookings_admit_exactly_one() {
    let setup = Arc::new(TestSetup::new());

    let attempts = (0..16).map(|i| {
        let setup = setup.clone();
        tokio::spawn(async move {
            // Every request overlaps 10:00-10:20 with a different start.
            let start = at(10, i % 8);
            setup.service.book(setup.request(start, Some(at(10, 20)))).await
        })
    });

    let results = futures::future::join_all(attempts).await;
    let admitted = results.into_iter()
        .map(|joined| joined.expect("task should not panic"))
        .filter(|result| result.is_ok())
        .count();

    assert_eq!(admitted, 1);

    let stored = setup.store.all().await;
    for (i, a) in stored.iter().enumerate() {
        for b in stored.iter().skip(i + 1) {
            assert!(!(a.start_time < b.end_time && b.start_time < a.end_time));
        }
    }
}
