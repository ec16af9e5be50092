//! Rollbook - a terminal front end for a student roster kept in an
//! Appwrite-style document service.
//!
//! With no arguments the keyboard-driven UI starts. `--login`, `--list` and
//! `--logout` run once without it.

mod app;
mod ui;
mod utils;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rollbook_core::api::ServiceClient;
use rollbook_core::auth::{CredentialStore, Session};
use rollbook_core::config::{Config, ENV_EMAIL, ENV_PASSWORD};
use rollbook_core::roster::{DelegatedLogin, RosterSession};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE: &str = "rollbook.log";

fn env_filter() -> EnvFilter {
    // RUST_LOG controls the level (e.g. RUST_LOG=rollbook_core=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr; used by the headless modes.
fn init_stderr_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

/// Log to a file in the cache directory; the terminal belongs to the UI.
/// The returned guard flushes the writer when dropped.
fn init_file_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--login") => {
            init_stderr_tracing();
            return login_headless().await;
        }
        Some("--list") => {
            init_stderr_tracing();
            return list_headless().await;
        }
        Some("--logout") => {
            init_stderr_tracing();
            return logout_headless().await;
        }
        Some("--help") | Some("-h") => {
            print_usage();
            return Ok(());
        }
        Some(other) => {
            print_usage();
            anyhow::bail!("Unknown argument: {}", other);
        }
        None => {}
    }

    let log_dir = Config::load()
        .and_then(|c| c.cache_dir())
        .unwrap_or_else(|_| PathBuf::from("./cache"));
    let _log_guard = init_file_tracing(&log_dir)?;
    info!("Rollbook starting");

    // Create the app before touching the terminal so config errors print plainly
    let mut app = App::new().await?;
    app.check_identity();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Rollbook shutting down");
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: rollbook [--login | --list | --logout]");
    eprintln!();
    eprintln!("  (no arguments)  start the terminal UI");
    eprintln!("  --login         sign in with email and password and remember the session");
    eprintln!("  --list          print the roster as JSON");
    eprintln!("  --logout        end the remembered session");
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

// ============================================================================
// Headless modes
// ============================================================================

/// Config, persisted session, and a client carrying that session.
async fn headless_context() -> Result<(Config, Session, Arc<ServiceClient>)> {
    let config = Config::load()?;
    let api = Arc::new(ServiceClient::new(&config).context("Cannot reach the roster service")?);

    let mut session = Session::new(config.cache_dir()?);
    if let Err(e) = session.load() {
        warn!(error = %e, "Failed to load session");
    }
    if let Some(secret) = session.secret() {
        api.set_session(secret.to_string()).await;
    }

    Ok((config, session, api))
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

async fn login_headless() -> Result<()> {
    let (mut config, mut session, api) = headless_context().await?;

    let email = match std::env::var(ENV_EMAIL) {
        Ok(email) if !email.trim().is_empty() => email,
        _ => match config.last_email.clone() {
            Some(last) => {
                let input = prompt_line(&format!("Email [{}]: ", last))?;
                if input.is_empty() {
                    last
                } else {
                    input
                }
            }
            None => prompt_line("Email: ")?,
        },
    };

    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    let mut roster = RosterSession::new(api, DelegatedLogin::from_config(&config));
    let (session_data, _) = roster
        .sign_in(&email, &password)
        .await
        .map_err(|failure| anyhow::anyhow!("Login failed: {}", failure))?;

    if let Err(e) = CredentialStore::store(&email, &password) {
        warn!(error = %e, "Failed to store credentials");
    }
    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    let expires_in = session_data.days_until_expiry();
    session.update(session_data);
    session.save().context("Failed to save session")?;

    if let Some(identity) = roster.identity() {
        println!(
            "Signed in as {} <{}> (session valid for {} days)",
            identity.display_name(),
            identity.email,
            expires_in
        );
    }
    Ok(())
}

async fn list_headless() -> Result<()> {
    let (config, session, api) = headless_context().await?;
    if session.data.is_none() {
        anyhow::bail!("No saved session. Run `rollbook --login` first.");
    }

    let mut roster = RosterSession::new(api, DelegatedLogin::from_config(&config));
    if roster.get_current_identity().await.is_none() {
        anyhow::bail!("Saved session is no longer valid. Run `rollbook --login` again.");
    }
    if let Some(error) = roster.roster_error() {
        anyhow::bail!("{}", error);
    }

    println!("{}", serde_json::to_string_pretty(roster.students())?);
    Ok(())
}

async fn logout_headless() -> Result<()> {
    let (config, mut session, api) = headless_context().await?;

    let mut roster = RosterSession::new(api, DelegatedLogin::from_config(&config));
    roster.logout().await;
    session.clear().context("Failed to remove session file")?;

    println!("Signed out");
    Ok(())
}
