// libs/patient-cell/tests/patient_service_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use patient_cell::models::*;
use patient_cell::services::*;
use security_cell::{ContactField, CredentialHasher, PasswordSecurityService};

fn service() -> (PatientService, Arc<PasswordSecurityService>) {
    let hasher = Arc::new(PasswordSecurityService::low_cost());
    let service = PatientService::new(Arc::new(InMemoryPatientStore::new()), hasher.clone());
    (service, hasher)
}

fn create_request(email: &str, phone: Option<&str>, tag: &str) -> CreatePatientRequest {
    CreatePatientRequest {
        name: "Ivan".to_string(),
        family_name: "Petrov".to_string(),
        patronymic: None,
        gender: Gender::Male,
        email: email.to_string(),
        phone: phone.map(str::to_string),
        password: "patient-secret".to_string(),
        tag_social: tag.to_string(),
    }
}

#[tokio::test]
async fn test_create_patient_hashes_password_and_normalizes_email() {
    let (service, hasher) = service();

    let patient = service
        .create_patient(create_request("Ivan@Mail.RU", Some("+79990001122"), "@ivan"))
        .await
        .unwrap();

    assert_eq!(patient.email, "ivan@mail.ru");
    assert_eq!(patient.tag_social, "@ivan");
    assert_ne!(patient.password_hash, "patient-secret");
    assert!(hasher.verify_password("patient-secret", &patient.password_hash).unwrap());
    assert_eq!(service.get_patient(patient.id).await.unwrap(), patient);
}

#[tokio::test]
async fn test_create_patient_rejects_bad_social_tag() {
    let (service, _) = service();

    let result = service
        .create_patient(create_request("ivan@mail.ru", None, "ivan"))
        .await;

    assert_matches!(result, Err(PatientError::InvalidSocialTag(tag)) if tag == "ivan");
}

#[tokio::test]
async fn test_create_patient_requires_social_tag() {
    let (service, _) = service();

    let result = service
        .create_patient(create_request("ivan@mail.ru", None, ""))
        .await;

    assert_matches!(result, Err(PatientError::MissingField("tag_social")));
}

#[tokio::test]
async fn test_duplicate_contacts_are_rejected() {
    let (service, _) = service();
    service
        .create_patient(create_request("ivan@mail.ru", Some("+79990001122"), "@ivan"))
        .await
        .unwrap();

    let same_email = service
        .create_patient(create_request("IVAN@mail.ru", None, "@other"))
        .await;
    assert_matches!(
        same_email,
        Err(PatientError::DuplicateContactField { field: ContactField::Email })
    );

    let same_phone = service
        .create_patient(create_request("other@mail.ru", Some("+7 999 000-11-22"), "@other"))
        .await;
    assert_matches!(
        same_phone,
        Err(PatientError::DuplicateContactField { field: ContactField::Phone })
    );
}

#[tokio::test]
async fn test_deleted_patient_releases_contacts() {
    let (service, _) = service();
    let first = service
        .create_patient(create_request("ivan@mail.ru", None, "@ivan"))
        .await
        .unwrap();

    service.delete_patient(first.id).await.unwrap();

    assert_matches!(service.get_patient(first.id).await, Err(PatientError::NotFound));
    assert!(service
        .create_patient(create_request("ivan@mail.ru", None, "@ivan2"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_update_allows_clearing_tag_and_keeping_own_email() {
    let (service, _) = service();
    let patient = service
        .create_patient(create_request("ivan@mail.ru", None, "@ivan"))
        .await
        .unwrap();

    let updated = service
        .update_patient(
            patient.id,
            UpdatePatientRequest {
                email: Some("ivan@mail.ru".to_string()),
                tag_social: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.tag_social, "");
    assert_eq!(updated.email, "ivan@mail.ru");
}

#[tokio::test]
async fn test_update_rejects_bad_tag_without_writing() {
    let (service, _) = service();
    let patient = service
        .create_patient(create_request("ivan@mail.ru", None, "@ivan"))
        .await
        .unwrap();

    let result = service
        .update_patient(
            patient.id,
            UpdatePatientRequest {
                name: Some("Pyotr".to_string()),
                tag_social: Some("pyotr".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert_matches!(result, Err(PatientError::InvalidSocialTag(_)));
    assert_eq!(service.get_patient(patient.id).await.unwrap().name, "Ivan");
}

#[tokio::test]
async fn test_update_rejects_email_of_another_patient() {
    let (service, _) = service();
    service
        .create_patient(create_request("taken@mail.ru", None, "@a"))
        .await
        .unwrap();
    let patient = service
        .create_patient(create_request("ivan@mail.ru", None, "@b"))
        .await
        .unwrap();

    let result = service
        .update_patient(
            patient.id,
            UpdatePatientRequest {
                email: Some("taken@mail.ru".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert_matches!(
        result,
        Err(PatientError::DuplicateContactField { field: ContactField::Email })
    );
}

#[tokio::test]
async fn test_unknown_patient_is_not_found() {
    let (service, _) = service();

    assert_matches!(service.get_patient(Uuid::new_v4()).await, Err(PatientError::NotFound));
    assert_matches!(service.delete_patient(Uuid::new_v4()).await, Err(PatientError::NotFound));
}

#[tokio::test]
async fn test_update_rejects_blank_names_without_writing() {
    let (service, _) = service();
    let patient = service
        .create_patient(create_request("ivan@mail.ru", None, "@ivan"))
        .await
        .unwrap();

    let blank_name = service
        .update_patient(
            patient.id,
            UpdatePatientRequest {
                name: Some("   ".to_string()),
                tag_social: Some("@renamed".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(blank_name, Err(PatientError::MissingField("name")));

    let blank_family_name = service
        .update_patient(
            patient.id,
            UpdatePatientRequest {
                family_name: Some(String::new()),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(blank_family_name, Err(PatientError::MissingField("family_name")));

    let stored = service.get_patient(patient.id).await.unwrap();
    assert_eq!(stored.name, "Ivan");
    assert_eq!(stored.family_name, "Petrov");
    assert_eq!(stored.tag_social, "@ivan");
}
