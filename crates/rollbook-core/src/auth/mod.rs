//! Authentication persistence.
//!
//! - `Session`: the service session secret, persisted to the cache directory
//! - `CredentialStore`: remembered passwords in the OS keychain via keyring

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData};
