pub mod booking;
pub mod conflict;
pub mod store;

pub use booking::{ConsultationBookingService, DoctorLocks};
pub use conflict::{normalize_interval, ConflictDetectionService};
pub use store::{ConsultationStore, InMemoryConsultationStore, SupabaseConsultationStore};
