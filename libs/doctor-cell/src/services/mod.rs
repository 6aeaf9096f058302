pub mod doctor;
pub mod education;
pub mod store;

pub use doctor::{validate_employment_dates, DoctorService};
pub use education::validate_education_payload;
pub use store::{
    DoctorStore, EducationStore, InMemoryDoctorStore, InMemoryEducationStore,
    SupabaseDoctorStore, SupabaseEducationStore,
};
