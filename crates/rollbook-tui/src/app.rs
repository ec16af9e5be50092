//! Application state for the rollbook terminal UI.
//!
//! `App` owns the `RosterSession` state machine plus everything that only
//! matters to the terminal: form buffers, focus, selection, and the channel
//! that background requests report back on.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use rollbook_core::api::ServiceClient;
use rollbook_core::auth::{CredentialStore, Session};
use rollbook_core::config::{Config, ENV_EMAIL, ENV_PASSWORD};
use rollbook_core::models::{DraftField, Identity, StudentDraft, StudentRecord};
use rollbook_core::roster::commands;
use rollbook_core::roster::{
    DelegatedLogin, FetchFailure, FetchTicket, IdentityChange, MutationFailure, MutationKind,
    MutationOutcome, MutationTicket, ProbeTicket, RosterSession, View,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for any draft field.
const MAX_DRAFT_FIELD_LENGTH: usize = 64;

/// Number of rows to move on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    /// Typing into the new-student form
    EditingDraft,
    ShowingHelp,
    ConfirmingDelete,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
    Provider,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Provider,
            LoginFocus::Provider => LoginFocus::Email,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Provider,
            LoginFocus::Password => LoginFocus::Email,
            LoginFocus::Button => LoginFocus::Password,
            LoginFocus::Provider => LoginFocus::Button,
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Outcomes sent back from spawned requests to the event loop.
enum BackgroundResult {
    /// Result of a current-identity probe
    Identity(ProbeTicket, Option<Identity>),
    /// A roster listing, tagged with the ticket it was issued under
    Students(FetchTicket, Result<Vec<StudentRecord>, FetchFailure>),
    /// An add or delete finished
    Mutation(MutationTicket, Result<(), MutationFailure>),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub config: Config,
    pub session: Session,
    api: Arc<ServiceClient>,
    pub roster: RosterSession<ServiceClient>,

    pub state: AppState,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,

    // New-student form state
    pub draft: StudentDraft,
    pub draft_focus: DraftField,

    pub selection: usize,
    pub status_message: Option<String>,
    pending_mutations: usize,

    result_tx: mpsc::Sender<BackgroundResult>,
    result_rx: mpsc::Receiver<BackgroundResult>,
}

impl App {
    /// Create the application and attach any persisted session to the client.
    pub async fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let api = Arc::new(
            ServiceClient::new(&config).context("Cannot reach the roster service")?,
        );

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");

        let mut session = Session::new(cache_dir);
        match session.load() {
            Ok(true) => {
                if let Some(secret) = session.secret() {
                    api.set_session(secret.to_string()).await;
                    debug!("Restored persisted session");
                }
            }
            Ok(false) => debug!("No persisted session"),
            Err(e) => warn!(error = %e, "Failed to load session"),
        }

        let login_email = std::env::var(ENV_EMAIL)
            .ok()
            .or_else(|| config.last_email.clone())
            .unwrap_or_default();

        let login_password = std::env::var(ENV_PASSWORD).ok().unwrap_or_else(|| {
            if login_email.is_empty() {
                return String::new();
            }
            CredentialStore::get_password(&login_email).unwrap_or_else(|e| {
                debug!(error = %e, "No stored password");
                String::new()
            })
        });

        let mut app = Self::with_parts(config, session, api);
        app.login_focus = if login_email.is_empty() {
            LoginFocus::Email
        } else if login_password.is_empty() {
            LoginFocus::Password
        } else {
            LoginFocus::Button
        };
        app.login_email = login_email;
        app.login_password = login_password;
        Ok(app)
    }

    /// Assemble the app around an already configured client and session,
    /// with an empty login form.
    fn with_parts(config: Config, session: Session, api: Arc<ServiceClient>) -> Self {
        let roster = RosterSession::new(Arc::clone(&api), DelegatedLogin::from_config(&config));
        let (result_tx, result_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Self {
            config,
            session,
            api,
            roster,

            state: AppState::Normal,

            login_email: String::new(),
            login_password: String::new(),
            login_focus: LoginFocus::Email,

            draft: StudentDraft::default(),
            draft_focus: DraftField::StudentNumber,

            selection: 0,
            status_message: None,
            pending_mutations: 0,

            result_tx,
            result_rx,
        }
    }

    /// An app whose client points at a closed local port, so spawned
    /// requests fail fast and never reach a real service.
    #[cfg(test)]
    pub(crate) fn for_tests(cache_dir: &std::path::Path) -> Self {
        let config = Config {
            endpoint: "http://127.0.0.1:9/v1".to_string(),
            project_id: Some("proj".to_string()),
            ..Config::default()
        };
        let api = Arc::new(ServiceClient::new(&config).unwrap());
        Self::with_parts(config, Session::new(cache_dir.to_path_buf()), api)
    }

    pub fn view(&self) -> View<'_> {
        self.roster.view()
    }

    /// True while a listing or an add/delete is outstanding.
    pub fn is_busy(&self) -> bool {
        self.roster.is_loading() || self.pending_mutations > 0
    }

    pub fn selected_student(&self) -> Option<&StudentRecord> {
        self.roster.students().get(self.selection)
    }

    async fn send_result(tx: &mpsc::Sender<BackgroundResult>, result: BackgroundResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send background result - channel closed");
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Ask the service who is signed in. The answer arrives through
    /// `check_background_tasks`.
    pub fn check_identity(&mut self) {
        let ticket = self.roster.begin_probe();
        let api = Arc::clone(&self.api);
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let identity = commands::probe_identity(api.as_ref()).await;
            Self::send_result(&tx, BackgroundResult::Identity(ticket, identity)).await;
        });
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) {
        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();

        let result = self.roster.sign_in(&email, &password).await;
        // Every request from before the attempt is orphaned
        self.pending_mutations = 0;

        match result {
            Ok((session_data, change)) => {
                if let Err(e) = CredentialStore::store(&email, &password) {
                    warn!(error = %e, "Failed to store credentials");
                }

                self.config.last_email = Some(email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.session.update(session_data);
                if let Err(e) = self.session.save() {
                    warn!(error = %e, "Failed to save session");
                }

                self.login_password.clear();
                self.status_message = None;
                info!("Login successful");

                if change == IdentityChange::SignedIn {
                    self.selection = 0;
                    self.refresh_students();
                }
            }
            Err(failure) => {
                debug!(error = %failure, "Login rejected");
            }
        }
    }

    /// Open the delegated provider's login page in the browser.
    pub fn start_delegated_login(&mut self) {
        let provider = self.config.oauth_provider.clone();
        if self.roster.login_with_delegated_provider(&provider).is_ok() {
            self.status_message = Some(format!(
                "Continue signing in with {} in your browser",
                provider
            ));
        }
    }

    /// End the session remotely and locally, then show the login view.
    pub async fn logout(&mut self) {
        self.roster.logout().await;
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to remove session file");
        }

        self.draft = StudentDraft::default();
        self.draft_focus = DraftField::StudentNumber;
        self.selection = 0;
        self.pending_mutations = 0;
        self.state = AppState::Normal;
        self.status_message = Some("Signed out".to_string());
        self.login_focus = if self.login_email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
    }

    // =========================================================================
    // Roster
    // =========================================================================

    fn spawn_fetch(&self, ticket: FetchTicket) {
        let api = Arc::clone(&self.api);
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = commands::fetch_students(api.as_ref()).await;
            Self::send_result(&tx, BackgroundResult::Students(ticket, result)).await;
        });
    }

    /// Start a full roster listing in the background.
    pub fn refresh_students(&mut self) {
        if let Some(ticket) = self.roster.begin_list() {
            debug!(seq = ticket.seq(), "Refreshing students");
            self.spawn_fetch(ticket);
        }
    }

    /// Submit the draft in the background. The draft is kept until the
    /// service accepts it.
    pub fn submit_draft(&mut self) {
        let Ok(ticket) = self.roster.begin_mutation(MutationKind::Create) else {
            return;
        };

        let api = Arc::clone(&self.api);
        let tx = self.result_tx.clone();
        let draft = self.draft.clone();
        self.pending_mutations += 1;
        self.status_message = Some("Saving student...".to_string());

        tokio::spawn(async move {
            let result = commands::create_student(api.as_ref(), &draft).await.map(|_| ());
            Self::send_result(&tx, BackgroundResult::Mutation(ticket, result)).await;
        });
    }

    /// Ask for confirmation before deleting the selected student.
    pub fn request_delete(&mut self) {
        if self.selected_student().is_some() {
            self.state = AppState::ConfirmingDelete;
        }
    }

    /// Delete the selected student in the background.
    pub fn delete_selected(&mut self) {
        self.state = AppState::Normal;
        let Some(id) = self.selected_student().map(|s| s.id.clone()) else {
            return;
        };
        let Ok(ticket) = self.roster.begin_mutation(MutationKind::Delete) else {
            return;
        };

        let api = Arc::clone(&self.api);
        let tx = self.result_tx.clone();
        self.pending_mutations += 1;
        self.status_message = Some("Deleting student...".to_string());

        tokio::spawn(async move {
            let result = commands::delete_student(api.as_ref(), &id).await;
            Self::send_result(&tx, BackgroundResult::Mutation(ticket, result)).await;
        });
    }

    // =========================================================================
    // Background results
    // =========================================================================

    /// Drain finished background requests and apply them in arrival order.
    pub fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            results.push(result);
        }

        for result in results {
            self.process_result(result);
        }
    }

    fn process_result(&mut self, result: BackgroundResult) {
        match result {
            BackgroundResult::Identity(ticket, identity) => match self.roster.apply_identity(ticket, identity) {
                None => debug!("Dropped stale identity probe"),
                Some(IdentityChange::SignedIn) => {
                    self.selection = 0;
                    self.refresh_students();
                }
                Some(IdentityChange::SignedOut) => {
                    self.pending_mutations = 0;
                    if self.session.data.is_some() {
                        info!("Persisted session rejected, removing");
                        if let Err(e) = self.session.clear() {
                            warn!(error = %e, "Failed to remove session file");
                        }
                    }
                }
                Some(IdentityChange::Unchanged) => {}
            },
            BackgroundResult::Students(ticket, result) => {
                if self.roster.apply_list(ticket, result) {
                    self.clamp_selection();
                } else {
                    debug!(seq = ticket.seq(), "Dropped stale listing");
                }
            }
            BackgroundResult::Mutation(ticket, result) => {
                let succeeded = result.is_ok();
                match self.roster.apply_mutation(ticket, result) {
                    MutationOutcome::Stale => {
                        debug!(kind = ?ticket.kind(), "Dropped mutation from previous sign-in");
                        return;
                    }
                    MutationOutcome::Resync(fetch) => self.spawn_fetch(fetch),
                    MutationOutcome::Failed => {}
                }
                self.pending_mutations = self.pending_mutations.saturating_sub(1);

                self.status_message = match (ticket.kind(), succeeded) {
                    (MutationKind::Create, true) => {
                        self.draft = StudentDraft::default();
                        self.draft_focus = DraftField::StudentNumber;
                        Some("Student added".to_string())
                    }
                    (MutationKind::Delete, true) => Some("Student deleted".to_string()),
                    (_, false) => None,
                };
            }
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.roster.students().len();
        self.selection = self.selection.min(len.saturating_sub(1));
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_draft_char(current_len: usize, c: char) -> bool {
    current_len < MAX_DRAFT_FIELD_LENGTH && is_valid_input_char(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, Utc};
    use rollbook_core::auth::SessionData;

    fn identity() -> Identity {
        Identity {
            id: "user-1".to_string(),
            email: "a@b.com".to_string(),
            name: "Ada".to_string(),
        }
    }

    fn sign_in(app: &mut App) {
        let ticket = app.roster.begin_probe();
        app.process_result(BackgroundResult::Identity(ticket, Some(identity())));
        assert!(app.roster.auth_state().is_authenticated());
    }

    fn session_data() -> SessionData {
        let now = Utc::now();
        SessionData {
            session_id: "sess-1".to_string(),
            user_id: "user-1".to_string(),
            secret: "secret".to_string(),
            expire: now + Duration::days(30),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_failed_create_keeps_draft() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::for_tests(dir.path());
        sign_in(&mut app);
        app.draft.first_name = "Ada".to_string();

        let ticket = app.roster.begin_mutation(MutationKind::Create).unwrap();
        app.pending_mutations = 1;
        let failure = MutationFailure::new(MutationKind::Create, "Document is invalid");
        app.process_result(BackgroundResult::Mutation(ticket, Err(failure)));

        assert_eq!(app.draft.first_name, "Ada");
        assert_eq!(app.pending_mutations, 0);
        assert!(app.status_message.is_none());
        assert_eq!(
            app.roster.roster_error().map(|e| e.to_string()),
            Some("Could not add student: Document is invalid".to_string())
        );
    }

    #[tokio::test]
    async fn test_successful_create_clears_draft_and_resyncs() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::for_tests(dir.path());
        sign_in(&mut app);
        app.draft.first_name = "Ada".to_string();
        app.draft_focus = DraftField::GradeLevel;

        let ticket = app.roster.begin_mutation(MutationKind::Create).unwrap();
        app.pending_mutations = 1;
        app.process_result(BackgroundResult::Mutation(ticket, Ok(())));

        assert_eq!(app.draft, StudentDraft::default());
        assert_eq!(app.draft_focus, DraftField::StudentNumber);
        assert_eq!(app.pending_mutations, 0);
        assert_eq!(app.status_message.as_deref(), Some("Student added"));
        assert!(app.roster.is_loading());
    }

    #[tokio::test]
    async fn test_mutation_from_before_logout_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::for_tests(dir.path());
        sign_in(&mut app);

        let ticket = app.roster.begin_mutation(MutationKind::Delete).unwrap();
        app.pending_mutations = 1;
        app.logout().await;
        assert_eq!(app.pending_mutations, 0);
        sign_in(&mut app);

        let failure = MutationFailure::new(MutationKind::Delete, "Document not found");
        app.process_result(BackgroundResult::Mutation(ticket, Err(failure)));

        assert!(app.roster.roster_error().is_none());
        assert_eq!(app.pending_mutations, 0);
        assert_eq!(app.status_message.as_deref(), Some("Signed out"));
    }

    #[tokio::test]
    async fn test_rejected_probe_removes_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::for_tests(dir.path());
        app.session.update(session_data());
        app.session.save().unwrap();
        assert!(dir.path().join("session.json").exists());

        let ticket = app.roster.begin_probe();
        app.process_result(BackgroundResult::Identity(ticket, None));

        assert!(matches!(app.view(), View::Login { .. }));
        assert!(app.session.data.is_none());
        assert!(!dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn test_older_probe_does_not_sign_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::for_tests(dir.path());
        app.session.update(session_data());
        app.session.save().unwrap();

        let older = app.roster.begin_probe();
        let newer = app.roster.begin_probe();
        app.process_result(BackgroundResult::Identity(newer, Some(identity())));
        app.process_result(BackgroundResult::Identity(older, None));

        assert!(matches!(app.view(), View::Roster { .. }));
        assert!(app.session.data.is_some());
        assert!(dir.path().join("session.json").exists());
    }

    #[test]
    fn test_login_focus_cycle() {
        assert_eq!(LoginFocus::Email.next(), LoginFocus::Password);
        assert_eq!(LoginFocus::Provider.next(), LoginFocus::Email);
        assert_eq!(LoginFocus::Email.prev(), LoginFocus::Provider);
        assert_eq!(LoginFocus::Button.prev(), LoginFocus::Password);
    }

    #[test]
    fn test_can_add_email_char() {
        assert!(can_add_email_char(0, 'a'));
        assert!(can_add_email_char(0, '@'));
        assert!(can_add_email_char(253, 'z'));
        assert!(!can_add_email_char(254, 'a'));
        assert!(!can_add_email_char(0, ' '));
        assert!(!can_add_email_char(0, '\t'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(0, ' '));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\x00'));
        assert!(!can_add_password_char(0, '\r'));
    }

    #[test]
    fn test_can_add_draft_char() {
        assert!(can_add_draft_char(0, '7'));
        assert!(can_add_draft_char(0, ' '));
        assert!(!can_add_draft_char(64, 'a'));
        assert!(!can_add_draft_char(0, '\n'));
    }
}
