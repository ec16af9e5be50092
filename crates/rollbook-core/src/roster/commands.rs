//! One network round trip each, mapped into roster outcome types.
//!
//! These hold no state, so a front end can run them on spawned tasks and
//! feed the results back through the `RosterSession::apply_*` methods.

use tracing::{debug, error, warn};

use crate::api::{Query, RosterBackend, CREATED_AT};
use crate::auth::SessionData;
use crate::models::{Identity, StudentDraft, StudentRecord};

use super::error::{AuthFailure, FetchFailure, MutationFailure, MutationKind, AUTH_FAILED};

/// Ask the service who is signed in. Every failure reads as "nobody".
pub async fn probe_identity<B: RosterBackend + ?Sized>(backend: &B) -> Option<Identity> {
    match backend.current_identity().await {
        Ok(identity) => Some(identity),
        Err(e) => {
            debug!(error = %e, "No current identity");
            None
        }
    }
}

/// Create a password session.
pub async fn create_session<B: RosterBackend + ?Sized>(
    backend: &B,
    email: &str,
    password: &str,
) -> Result<SessionData, AuthFailure> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthFailure::new("Email and password required"));
    }

    backend
        .create_password_session(email.trim(), password)
        .await
        .map_err(|e| {
            error!(error = %e, "Login failed");
            AuthFailure::from_api(&e, AUTH_FAILED)
        })
}

/// All students, newest first as ordered by the service.
pub async fn fetch_students<B: RosterBackend + ?Sized>(backend: &B) -> Result<Vec<StudentRecord>, FetchFailure> {
    backend
        .list_students(&[Query::order_desc(CREATED_AT)])
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list students");
            FetchFailure::from(e)
        })
}

/// Submit a draft. An uncoercible grade level is still submitted, as null.
pub async fn create_student<B: RosterBackend + ?Sized>(
    backend: &B,
    draft: &StudentDraft,
) -> Result<StudentRecord, MutationFailure> {
    let fields = draft.to_fields();
    if fields.grade_level.is_none() {
        warn!(grade_level = %draft.grade_level, "Grade level is not a number, submitting without one");
    }

    backend.create_student(&fields).await.map_err(|e| {
        error!(error = %e, "Failed to create student");
        MutationFailure::from_api(MutationKind::Create, &e)
    })
}

pub async fn delete_student<B: RosterBackend + ?Sized>(backend: &B, id: &str) -> Result<(), MutationFailure> {
    backend.delete_student(id).await.map_err(|e| {
        error!(error = %e, id, "Failed to delete student");
        MutationFailure::from_api(MutationKind::Delete, &e)
    })
}
