pub mod clinic;
pub mod store;

pub use clinic::ClinicService;
pub use store::{ClinicStore, InMemoryClinicStore, SupabaseClinicStore};
