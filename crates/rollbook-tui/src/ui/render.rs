use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use rollbook_core::roster::{AuthFailure, View};

use crate::app::{App, AppState, LoginFocus};
use crate::utils::truncate_string;

use super::roster;
use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    let view = app.view();

    render_title_bar(frame, &view, chunks[0]);
    match view {
        View::Checking => render_checking(frame, chunks[1]),
        View::Login { error } => render_login(frame, app, error, chunks[1]),
        View::Roster {
            status,
            students,
            error,
            ..
        } => roster::render(frame, app, chunks[1], status, students, error),
    }
    render_status_bar(frame, app, &view, chunks[2]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::ConfirmingDelete => render_delete_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        _ => {}
    }
}

fn render_title_bar(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let title = "  Rollbook";
    let right = match view {
        View::Roster { identity, .. } => format!("{}  [?] Help", identity.display_name()),
        _ => String::new(),
    };

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + right.chars().count() + 2),
        )),
        Span::styled(right, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_checking(frame: &mut Frame, area: Rect) {
    let area = centered_rect_fixed(30, 3, area);
    let paragraph = Paragraph::new(Line::from(Span::styled(
        "  Checking session...",
        styles::muted_style(),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    frame.render_widget(paragraph, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, view: &View<'_>, area: Rect) {
    let (left_text, left_style) = if let Some(ref msg) = app.status_message {
        (format!(" {} ", msg), styles::success_style())
    } else if app.is_busy() {
        (" Working... ".to_string(), styles::muted_style())
    } else {
        match view {
            View::Roster { identity, .. } => {
                (format!(" Signed in as {} ", identity.email), styles::muted_style())
            }
            _ => (String::new(), styles::muted_style()),
        }
    };

    let shortcuts = match view {
        View::Roster { .. } => "[L]ogout | [q]uit",
        View::Login { .. } => "[F5] re-check | [Esc] quit",
        View::Checking => "[q]uit",
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

fn render_login(frame: &mut Frame, app: &App, error: Option<&AuthFailure>, area: Rect) {
    let height = if error.is_some() { 13 } else { 11 };
    let area = centered_rect_fixed(50, height, area);

    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];

    let email_focused = app.login_focus == LoginFocus::Email;
    let cursor = if email_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("   "),
        Span::styled("Email:    [", styles::muted_style()),
        Span::styled(
            format!("{:<24}{}", truncate_string(&app.login_email, 24), cursor),
            field_style(email_focused),
        ),
        Span::styled("]", styles::muted_style()),
    ]));

    let password_focused = app.login_focus == LoginFocus::Password;
    let cursor = if password_focused { "▌" } else { "" };
    let password_masked = "*".repeat(app.login_password.chars().count().min(24));
    lines.push(Line::from(vec![
        Span::raw("   "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(
            format!("{:<24}{}", password_masked, cursor),
            field_style(password_focused),
        ),
        Span::styled("]", styles::muted_style()),
    ]));

    lines.push(Line::from(""));
    lines.push(button_line("Login", app.login_focus == LoginFocus::Button));
    lines.push(Line::from(""));
    lines.push(button_line(
        &format!("Sign in with {}", app.config.oauth_provider),
        app.login_focus == LoginFocus::Provider,
    ));

    if let Some(error) = error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .title(" Sign in ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_style(focused: bool) -> Style {
    if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    }
}

fn button_line(label: &str, focused: bool) -> Line<'static> {
    let text = if focused {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    Line::from(vec![
        Span::raw("   ["),
        Span::styled(text, field_style(focused)),
        Span::raw("]"),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 17, frame.area());
    frame.render_widget(Clear, area);

    let key = |k: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", k), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled(
            format!("  Rollbook {}", env!("CARGO_PKG_VERSION")),
            styles::title_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Roster", styles::highlight_style())),
        key("↑/↓ j/k", "Move selection"),
        key("a / Tab", "Edit new-student form"),
        key("d / Del", "Delete selected student"),
        key("r / F5", "Reload from service"),
        key("L", "Log out"),
        key("q", "Quit"),
        Line::from(""),
        Line::from(Span::styled(" Form", styles::highlight_style())),
        key("Tab / ↓", "Next field"),
        key("Enter", "Save student"),
        key("Esc", "Back to table"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_delete_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let name = app
        .selected_student()
        .map(|s| format!("{} ({})", s.display_name(), s.student_number))
        .unwrap_or_default();

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("   Delete {}?", truncate_string(&name, 34)),
            styles::highlight_style(),
        )),
        Line::from(""),
        confirm_line("delete"),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        confirm_line("quit"),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn confirm_line(action: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled("   Press ", styles::muted_style()),
        Span::styled("[Y]", styles::help_key_style()),
        Span::styled(format!(" to {}, ", action), styles::muted_style()),
        Span::styled("[N]", styles::help_key_style()),
        Span::styled(" to cancel", styles::muted_style()),
    ])
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_centered_rect_fixed() {
        let outer = Rect::new(0, 0, 100, 40);
        assert_eq!(centered_rect_fixed(50, 10, outer), Rect::new(25, 15, 50, 10));

        let small = Rect::new(0, 0, 20, 5);
        assert_eq!(centered_rect_fixed(50, 10, small), Rect::new(0, 0, 20, 5));
    }

    #[test]
    fn test_login_box_leaves_bars_visible_on_short_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::for_tests(dir.path());
        let probe = app.roster.begin_probe();
        app.roster.apply_identity(probe, None);
        // No app URL configured, so the login view carries an error line
        assert!(app.roster.login_with_delegated_provider("auth0").is_err());

        let mut terminal = Terminal::new(TestBackend::new(80, 16)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let row = |y: u16| (0..80).map(|x| buffer[(x, y)].symbol()).collect::<String>();
        assert!(row(0).contains("Rollbook"));
        assert!(row(2).chars().all(|c| c == '─'));
        assert!(row(14).contains("[F5] re-check"));
    }
}
