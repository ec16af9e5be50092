//! The seam between the roster state machine and the remote service.

use async_trait::async_trait;

use crate::auth::SessionData;
use crate::models::{Identity, StudentFields, StudentRecord};

use super::{ApiError, Query};

/// Operations the roster needs from the document-and-auth service.
///
/// Implementations hold the current session secret themselves: creating a
/// session attaches it, deleting the session detaches it.
#[async_trait]
pub trait RosterBackend: Send + Sync {
    /// Create a session from email and password.
    async fn create_password_session(&self, email: &str, password: &str) -> Result<SessionData, ApiError>;

    /// Build the browser URL that starts a delegated login with `provider`.
    /// Both the success and failure redirects go to `redirect`.
    fn delegated_login_url(&self, provider: &str, redirect: &str, scopes: &[String]) -> Result<String, ApiError>;

    /// Identity behind the attached session.
    async fn current_identity(&self) -> Result<Identity, ApiError>;

    /// Delete the attached session at the service.
    async fn delete_current_session(&self) -> Result<(), ApiError>;

    async fn list_students(&self, queries: &[Query]) -> Result<Vec<StudentRecord>, ApiError>;

    /// Create a student with a service-generated id.
    async fn create_student(&self, fields: &StudentFields) -> Result<StudentRecord, ApiError>;

    async fn delete_student(&self, id: &str) -> Result<(), ApiError>;
}
