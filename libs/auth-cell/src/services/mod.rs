pub mod auth;
pub mod credentials;
pub mod session;
pub mod store;

pub use auth::{extract_bearer_token, AuthService};
pub use credentials::{CredentialLookup, InMemoryCredentialLookup, SupabaseCredentialLookup};
pub use session::TokenSessionManager;
pub use store::{ExpiringStore, InMemoryExpiringStore, RedisTokenStore};
