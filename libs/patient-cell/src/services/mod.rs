pub mod patient;
pub mod store;

pub use patient::{validate_social_tag, PatientService};
pub use store::{InMemoryPatientStore, PatientStore, SupabasePatientStore};
