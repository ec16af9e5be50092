use crate::models::{Identity, StudentRecord};

use super::error::{AuthFailure, RosterError};
use super::store::FetchTicket;

/// Who is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Startup probe still in flight; neither view is shown yet.
    Checking,
    Anonymous,
    Authenticated(Identity),
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Progress of the roster listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RosterStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored,
}

/// What identity changed after applying a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityChange {
    Unchanged,
    /// A new identity is signed in; the roster must be fetched.
    SignedIn,
    /// No identity any more; roster state is stale.
    SignedOut,
}

/// What applying an add/delete outcome did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Succeeded; the resync listing was started under this ticket.
    Resync(FetchTicket),
    /// Failed; the roster error slot holds the reason.
    Failed,
    /// Started before the current sign-in; dropped.
    Stale,
}

/// The composed state a front end renders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum View<'a> {
    Checking,
    Login {
        error: Option<&'a AuthFailure>,
    },
    Roster {
        identity: &'a Identity,
        status: RosterStatus,
        students: &'a [StudentRecord],
        error: Option<&'a RosterError>,
    },
}
