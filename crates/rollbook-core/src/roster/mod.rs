//! The roster session state machine.
//!
//! `RosterSession` combines two parts:
//!
//! - a session manager (`Checking | Anonymous | Authenticated`) with the
//!   login error slot, and
//! - a roster store (`Idle | Loading | Loaded | Errored`) holding the last
//!   applied listing and the roster error slot.
//!
//! The roster is never patched locally: every successful add or delete is
//! followed by a full refetch, and every fetch is sequence-guarded (see
//! [`store`]).
//!
//! Each operation comes in a sequential `async fn` form and a split form
//! (`begin_list`/`apply_list`, `begin_probe`/`apply_identity`,
//! `begin_mutation`/`apply_mutation`) for callers that run the request
//! elsewhere. Split-form tickets carry the sign-in epoch, so an outcome
//! started before a login or logout is dropped when it arrives.

pub mod commands;
pub mod error;
pub mod session;
pub mod state;
pub mod store;

#[cfg(test)]
mod fake;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::RosterBackend;
use crate::auth::SessionData;
use crate::config::Config;
use crate::models::{Identity, StudentDraft, StudentRecord};

pub use error::{AuthFailure, FetchFailure, MutationFailure, MutationKind, RosterError};
pub use session::{MutationTicket, ProbeTicket, SessionManager};
pub use state::{AuthState, IdentityChange, MutationOutcome, RosterStatus, View};
pub use store::{FetchTicket, RosterStore};

use error::DELEGATED_LOGIN_FAILED;

/// Opens a URL outside the process (the system browser by default).
pub type UrlOpener = fn(&str) -> std::io::Result<()>;

fn open_in_browser(url: &str) -> std::io::Result<()> {
    open::that(url)
}

/// Fixed parameters of the delegated login redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedLogin {
    /// Success and failure redirect target; the web app's base URL.
    pub redirect_url: Option<String>,
    pub scopes: Vec<String>,
}

impl DelegatedLogin {
    pub fn from_config(config: &Config) -> Self {
        Self {
            redirect_url: config.app_url.clone(),
            scopes: config.oauth_scopes.clone(),
        }
    }
}

pub struct RosterSession<B: RosterBackend> {
    backend: Arc<B>,
    auth: SessionManager,
    roster: RosterStore,
    delegated: DelegatedLogin,
    open_url: UrlOpener,
}

impl<B: RosterBackend> RosterSession<B> {
    pub fn new(backend: Arc<B>, delegated: DelegatedLogin) -> Self {
        Self {
            backend,
            auth: SessionManager::new(),
            roster: RosterStore::new(),
            delegated,
            open_url: open_in_browser,
        }
    }

    /// Replace the browser launcher used by delegated login.
    pub fn with_url_opener(mut self, open_url: UrlOpener) -> Self {
        self.open_url = open_url;
        self
    }

    // =========================================================================
    // State access
    // =========================================================================

    pub fn auth_state(&self) -> &AuthState {
        self.auth.state()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.auth.identity()
    }

    pub fn auth_error(&self) -> Option<&AuthFailure> {
        self.auth.error()
    }

    pub fn students(&self) -> &[StudentRecord] {
        self.roster.students()
    }

    pub fn roster_status(&self) -> RosterStatus {
        self.roster.status()
    }

    pub fn roster_error(&self) -> Option<&RosterError> {
        self.roster.error()
    }

    pub fn is_loading(&self) -> bool {
        self.roster.is_loading()
    }

    /// The roster view iff an identity is present, the login view iff the
    /// probe resolved to nobody.
    pub fn view(&self) -> View<'_> {
        match self.auth.state() {
            AuthState::Checking => View::Checking,
            AuthState::Anonymous => View::Login {
                error: self.auth.error(),
            },
            AuthState::Authenticated(identity) => View::Roster {
                identity,
                status: self.roster.status(),
                students: self.roster.students(),
                error: self.roster.error(),
            },
        }
    }

    // =========================================================================
    // Session Manager
    // =========================================================================

    pub fn begin_probe(&mut self) -> ProbeTicket {
        self.auth.begin_probe()
    }

    /// Apply a probe result. `None` when the probe was stale and dropped.
    pub fn apply_identity(&mut self, ticket: ProbeTicket, identity: Option<Identity>) -> Option<IdentityChange> {
        if !self.auth.accept_probe(ticket) {
            return None;
        }
        Some(self.resolve_identity(identity))
    }

    /// Losing the identity invalidates the roster.
    fn resolve_identity(&mut self, identity: Option<Identity>) -> IdentityChange {
        let change = self.auth.resolve(identity);
        if change == IdentityChange::SignedOut {
            self.roster.invalidate();
        }
        change
    }

    /// Probe the service for the current identity; a newly signed-in
    /// identity triggers one roster fetch.
    pub async fn get_current_identity(&mut self) -> Option<Identity> {
        let ticket = self.begin_probe();
        let identity = commands::probe_identity(self.backend.as_ref()).await;
        if self.apply_identity(ticket, identity) == Some(IdentityChange::SignedIn) {
            self.list_students().await;
        }
        self.identity().cloned()
    }

    /// Create a session and probe the identity behind it, without fetching
    /// the roster. A failed attempt leaves nobody signed in and is recorded
    /// in the login error slot. Probes and mutations still in flight are
    /// orphaned.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<(SessionData, IdentityChange), AuthFailure> {
        self.auth.clear_error();
        self.auth.advance_epoch();

        let session = match commands::create_session(self.backend.as_ref(), email, password).await {
            Ok(session) => session,
            Err(failure) => {
                self.resolve_identity(None);
                self.auth.record_failure(failure.clone());
                return Err(failure);
            }
        };

        let identity = commands::probe_identity(self.backend.as_ref()).await;
        if identity.is_none() {
            let failure = AuthFailure::new("Signed in, but the account could not be loaded");
            self.resolve_identity(None);
            self.auth.record_failure(failure.clone());
            return Err(failure);
        }

        let change = self.resolve_identity(identity);
        Ok((session, change))
    }

    /// Password login. On success the identity is refreshed and, if it
    /// changed, the roster is fetched once.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<SessionData, AuthFailure> {
        let (session, change) = self.sign_in(email, password).await?;
        if change == IdentityChange::SignedIn {
            self.list_students().await;
        }
        Ok(session)
    }

    /// Start a delegated login by opening the provider redirect in the
    /// browser. Only the pre-redirect phase can fail here; the result of the
    /// redirect is picked up by the next identity probe.
    pub fn login_with_delegated_provider(&mut self, provider_id: &str) -> Result<(), AuthFailure> {
        self.auth.clear_error();

        let result = self.delegated_login_url(provider_id).and_then(|url| {
            info!(provider = provider_id, "Opening delegated login");
            (self.open_url)(&url).map_err(|e| {
                AuthFailure::new(format!("{}: could not open browser ({})", DELEGATED_LOGIN_FAILED, e))
            })
        });

        if let Err(ref failure) = result {
            warn!(provider = provider_id, error = %failure, "Delegated login not started");
            self.auth.record_failure(failure.clone());
        }
        result
    }

    fn delegated_login_url(&self, provider_id: &str) -> Result<String, AuthFailure> {
        let redirect = self
            .delegated
            .redirect_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AuthFailure::new(format!("{}: app URL not configured", DELEGATED_LOGIN_FAILED)))?;

        self.backend
            .delegated_login_url(provider_id, redirect, &self.delegated.scopes)
            .map_err(|e| AuthFailure::from_api(&e, DELEGATED_LOGIN_FAILED))
    }

    /// End the session at the service, then forget the identity and roster
    /// whether or not the service call succeeded.
    pub async fn logout(&mut self) {
        if let Err(e) = self.backend.delete_current_session().await {
            warn!(error = %e, "Failed to delete session at service");
        }
        self.sign_out_locally();
    }

    pub fn sign_out_locally(&mut self) {
        info!("Signed out");
        self.auth.sign_out();
        self.auth.clear_error();
        self.roster.invalidate();
    }

    // =========================================================================
    // Roster Store
    // =========================================================================

    /// Start a listing. `None` when nobody is signed in.
    pub fn begin_list(&mut self) -> Option<FetchTicket> {
        if !self.auth.state().is_authenticated() {
            return None;
        }
        Some(self.roster.begin_fetch())
    }

    /// Apply a listing outcome; stale outcomes are dropped.
    pub fn apply_list(&mut self, ticket: FetchTicket, result: Result<Vec<StudentRecord>, FetchFailure>) -> bool {
        self.roster.apply_fetch(ticket, result)
    }

    /// Start an add/delete. Fails with "not signed in" when nobody is.
    pub fn begin_mutation(&self, kind: MutationKind) -> Result<MutationTicket, MutationFailure> {
        if self.auth.state().is_authenticated() {
            Ok(self.auth.mutation_ticket(kind))
        } else {
            Err(MutationFailure::new(kind, "not signed in"))
        }
    }

    /// Apply an add/delete outcome. Success starts the resync listing;
    /// failure goes to the roster error slot. Outcomes started before the
    /// current sign-in are dropped.
    pub fn apply_mutation(&mut self, ticket: MutationTicket, result: Result<(), MutationFailure>) -> MutationOutcome {
        if !self.auth.is_current(ticket) {
            debug!(kind = ?ticket.kind(), "Dropping mutation outcome from previous sign-in");
            return MutationOutcome::Stale;
        }
        match result {
            Ok(()) => match self.begin_list() {
                Some(fetch) => MutationOutcome::Resync(fetch),
                None => MutationOutcome::Stale,
            },
            Err(failure) => {
                self.roster.record_mutation_failure(failure);
                MutationOutcome::Failed
            }
        }
    }

    async fn run_list(&mut self, ticket: FetchTicket) {
        let result = commands::fetch_students(self.backend.as_ref()).await;
        self.apply_list(ticket, result);
    }

    /// Replace the roster with the service's listing. No-op when nobody is
    /// signed in.
    pub async fn list_students(&mut self) {
        if let Some(ticket) = self.begin_list() {
            self.run_list(ticket).await;
        }
    }

    /// Create a student from the draft, then resync the roster.
    pub async fn add_student(&mut self, draft: &StudentDraft) -> Result<StudentRecord, MutationFailure> {
        let ticket = self.begin_mutation(MutationKind::Create)?;
        let result = commands::create_student(self.backend.as_ref(), draft).await;

        let outcome = self.apply_mutation(ticket, result.as_ref().map(|_| ()).map_err(Clone::clone));
        if let MutationOutcome::Resync(fetch) = outcome {
            self.run_list(fetch).await;
        }
        result
    }

    /// Delete a student, then resync the roster.
    pub async fn remove_student(&mut self, id: &str) -> Result<(), MutationFailure> {
        let ticket = self.begin_mutation(MutationKind::Delete)?;
        let result = commands::delete_student(self.backend.as_ref(), id).await;

        if let MutationOutcome::Resync(fetch) = self.apply_mutation(ticket, result.clone()) {
            self.run_list(fetch).await;
        }
        result
    }
}
