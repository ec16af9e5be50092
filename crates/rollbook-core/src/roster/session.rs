use tracing::{debug, info};

use crate::models::Identity;

use super::error::{AuthFailure, MutationKind};
use super::state::{AuthState, IdentityChange};

/// Issued when an identity probe starts; the result is applied only if no
/// newer probe was applied and the sign-in epoch has not moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTicket {
    seq: u64,
    epoch: u64,
}

/// Issued when an add or delete starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationTicket {
    kind: MutationKind,
    epoch: u64,
}

impl MutationTicket {
    pub fn kind(&self) -> MutationKind {
        self.kind
    }
}

/// Tracks the signed-in identity and the login view's error slot.
///
/// The epoch advances on every identity change, sign-out, and login
/// attempt. Tickets from an earlier epoch are stale.
#[derive(Debug)]
pub struct SessionManager {
    state: AuthState,
    error: Option<AuthFailure>,
    epoch: u64,
    issued_probe: u64,
    applied_probe: u64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            state: AuthState::Checking,
            error: None,
            epoch: 0,
            issued_probe: 0,
            applied_probe: 0,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.state.identity()
    }

    pub fn error(&self) -> Option<&AuthFailure> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn record_failure(&mut self, failure: AuthFailure) {
        self.error = Some(failure);
    }

    pub fn begin_probe(&mut self) -> ProbeTicket {
        self.issued_probe += 1;
        ProbeTicket {
            seq: self.issued_probe,
            epoch: self.epoch,
        }
    }

    /// Accept a probe result for `ticket`, or reject it as stale.
    pub fn accept_probe(&mut self, ticket: ProbeTicket) -> bool {
        if ticket.epoch != self.epoch || ticket.seq <= self.applied_probe {
            debug!(seq = ticket.seq, epoch = ticket.epoch, current = self.epoch, "Dropping stale identity probe");
            return false;
        }
        self.applied_probe = ticket.seq;
        true
    }

    pub fn mutation_ticket(&self, kind: MutationKind) -> MutationTicket {
        MutationTicket {
            kind,
            epoch: self.epoch,
        }
    }

    pub fn is_current(&self, ticket: MutationTicket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Orphan every probe and mutation still in flight.
    pub fn advance_epoch(&mut self) {
        self.epoch += 1;
        self.applied_probe = self.issued_probe;
    }

    /// Apply the outcome of an identity probe. A present identity means
    /// `Authenticated`, anything else means `Anonymous`.
    pub fn resolve(&mut self, identity: Option<Identity>) -> IdentityChange {
        let previous_id = self.state.identity().map(|i| i.id.clone());
        let was_checking = matches!(self.state, AuthState::Checking);

        match identity {
            Some(identity) => {
                let change = if previous_id.as_deref() == Some(identity.id.as_str()) {
                    IdentityChange::Unchanged
                } else {
                    info!(user_id = %identity.id, email = %identity.email, "Signed in");
                    IdentityChange::SignedIn
                };
                self.error = None;
                self.state = AuthState::Authenticated(identity);
                if change == IdentityChange::SignedIn {
                    self.advance_epoch();
                }
                change
            }
            None => {
                self.state = AuthState::Anonymous;
                if previous_id.is_some() || was_checking {
                    if previous_id.is_some() {
                        info!("Session no longer valid");
                    }
                    self.advance_epoch();
                    IdentityChange::SignedOut
                } else {
                    IdentityChange::Unchanged
                }
            }
        }
    }

    /// Forget the identity unconditionally.
    pub fn sign_out(&mut self) {
        self.state = AuthState::Anonymous;
        self.advance_epoch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            email: format!("{}@b.com", id),
            name: String::new(),
        }
    }

    #[test]
    fn test_starts_checking() {
        let manager = SessionManager::new();
        assert_eq!(manager.state(), &AuthState::Checking);
        assert!(manager.identity().is_none());
    }

    #[test]
    fn test_probe_transitions() {
        let mut manager = SessionManager::new();
        assert_eq!(manager.resolve(None), IdentityChange::SignedOut);
        assert_eq!(manager.state(), &AuthState::Anonymous);
        assert_eq!(manager.resolve(None), IdentityChange::Unchanged);

        assert_eq!(manager.resolve(Some(identity("a"))), IdentityChange::SignedIn);
        assert_eq!(manager.resolve(Some(identity("a"))), IdentityChange::Unchanged);
        assert_eq!(manager.resolve(Some(identity("b"))), IdentityChange::SignedIn);

        assert_eq!(manager.resolve(None), IdentityChange::SignedOut);
        assert!(!manager.state().is_authenticated());
    }

    #[test]
    fn test_sign_in_clears_error() {
        let mut manager = SessionManager::new();
        manager.resolve(None);
        manager.record_failure(AuthFailure::new("bad password"));
        assert!(manager.error().is_some());

        manager.resolve(Some(identity("a")));
        assert!(manager.error().is_none());
    }

    #[test]
    fn test_newer_probe_wins() {
        let mut manager = SessionManager::new();
        let first = manager.begin_probe();
        let second = manager.begin_probe();

        assert!(manager.accept_probe(second));
        assert!(!manager.accept_probe(first));
        assert!(!manager.accept_probe(second));
    }

    #[test]
    fn test_epoch_orphans_probes_and_mutations() {
        let mut manager = SessionManager::new();
        manager.resolve(Some(identity("a")));

        let probe = manager.begin_probe();
        let mutation = manager.mutation_ticket(MutationKind::Delete);
        assert!(manager.is_current(mutation));
        assert_eq!(mutation.kind(), MutationKind::Delete);

        manager.sign_out();
        assert!(!manager.accept_probe(probe));
        assert!(!manager.is_current(mutation));

        // Same identity again is a new epoch, not the old one
        manager.resolve(Some(identity("a")));
        assert!(!manager.is_current(mutation));
        let fresh = manager.begin_probe();
        assert!(manager.accept_probe(fresh));
    }
}
