use thiserror::Error;

use crate::api::ApiError;

/// Fallback shown when a password login fails without a service message.
pub const AUTH_FAILED: &str = "Authentication failed";

/// Fallback shown when a delegated login cannot be started.
pub const DELEGATED_LOGIN_FAILED: &str = "Delegated login failed";

/// Use the error's own message unless it is blank.
fn message_or(err: &ApiError, fallback: &str) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

/// A login or delegated-login initiation error, shown on the login view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthFailure {
    pub message: String,
}

impl AuthFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        Self::new(message_or(err, fallback))
    }
}

/// A failed roster listing. Replaces the table with its message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchFailure {
    pub message: String,
}

impl From<ApiError> for FetchFailure {
    fn from(err: ApiError) -> Self {
        Self { message: message_or(&err, "Could not load students") }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Delete,
}

impl MutationKind {
    pub fn verb(&self) -> &'static str {
        match self {
            MutationKind::Create => "add",
            MutationKind::Delete => "delete",
        }
    }
}

/// A failed add or delete. The roster data is left as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Could not {} student: {message}", .kind.verb())]
pub struct MutationFailure {
    pub kind: MutationKind,
    pub message: String,
}

impl MutationFailure {
    pub fn new(kind: MutationKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn from_api(kind: MutationKind, err: &ApiError) -> Self {
        Self::new(kind, message_or(err, "request failed"))
    }
}

/// The roster view's single error slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
    #[error(transparent)]
    Mutation(#[from] MutationFailure),
}

impl RosterError {
    /// Fetch failures replace the table; mutation failures sit above it.
    pub fn replaces_table(&self) -> bool {
        matches!(self, RosterError::Fetch(_))
    }
}
