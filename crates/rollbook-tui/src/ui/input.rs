//! Keyboard input handling for the TUI.
//!
//! Which handler runs depends first on the composed session view (checking,
//! login, roster), then on the overlay state.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use rollbook_core::roster::View;

use crate::app::{
    can_add_draft_char, can_add_email_char, can_add_password_char, App, AppState, LoginFocus,
    PAGE_SCROLL_SIZE,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    match app.view() {
        View::Checking => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            Ok(false)
        }
        View::Login { .. } => handle_login_input(app, key).await,
        View::Roster { .. } => handle_roster_input(app, key).await,
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = app.login_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = app.login_focus.prev();
        }
        KeyCode::F(5) => {
            // Pick up a session completed elsewhere
            app.check_identity();
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                app.login_focus = LoginFocus::Button;
                app.status_message = None;
                app.attempt_login().await;
            }
            LoginFocus::Provider => app.start_delegated_login(),
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button | LoginFocus::Provider => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.len(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.len(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button | LoginFocus::Provider => {}
        },
        _ => {}
    }
    Ok(false)
}

async fn handle_roster_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingDelete => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.delete_selected(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::EditingDraft => {
            handle_draft_input(app, key);
            return Ok(false);
        }
        AppState::Normal | AppState::ConfirmingQuit | AppState::Quitting => {}
    }

    let max_index = app.roster.students().len().saturating_sub(1);

    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('j') | KeyCode::Down => {
            app.selection = (app.selection + 1).min(max_index);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.selection = app.selection.saturating_sub(1);
        }
        KeyCode::Home => app.selection = 0,
        KeyCode::End => app.selection = max_index,
        KeyCode::PageDown => {
            app.selection = (app.selection + PAGE_SCROLL_SIZE).min(max_index);
        }
        KeyCode::PageUp => {
            app.selection = app.selection.saturating_sub(PAGE_SCROLL_SIZE);
        }
        KeyCode::Char('a') | KeyCode::Tab => app.state = AppState::EditingDraft,
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Char('r') | KeyCode::F(5) => {
            app.status_message = None;
            app.refresh_students();
        }
        KeyCode::Char('L') => app.logout().await,
        _ => {}
    }
    Ok(false)
}

fn handle_draft_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.state = AppState::Normal,
        KeyCode::Down | KeyCode::Tab => app.draft_focus = app.draft_focus.next(),
        KeyCode::Up | KeyCode::BackTab => app.draft_focus = app.draft_focus.prev(),
        KeyCode::Enter => app.submit_draft(),
        KeyCode::Backspace => {
            app.draft.field_mut(app.draft_focus).pop();
        }
        KeyCode::Char(c) => {
            let field = app.draft.field_mut(app.draft_focus);
            if can_add_draft_char(field.len(), c) {
                field.push(c);
            }
        }
        _ => {}
    }
}
