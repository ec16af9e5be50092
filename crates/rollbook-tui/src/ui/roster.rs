use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use rollbook_core::models::{DraftField, StudentRecord};
use rollbook_core::roster::{RosterError, RosterStatus};

use crate::app::{App, AppState};
use crate::ui::styles;
use crate::utils::{format_created, truncate_string};

/// Column width cap for free-text cells
const MAX_CELL_CHARS: usize = 24;

/// Roster view: student table on the left, new-student form on the right.
pub fn render(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    status: RosterStatus,
    students: &[StudentRecord],
    error: Option<&RosterError>,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    render_table_area(frame, app, chunks[0], status, students, error);
    render_draft_form(frame, app, chunks[1]);
}

fn render_table_area(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    status: RosterStatus,
    students: &[StudentRecord],
    error: Option<&RosterError>,
) {
    let focused = matches!(app.state, AppState::Normal | AppState::ConfirmingDelete);
    let block = Block::default()
        .title(table_title(status, students.len()))
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused));

    // A failed listing replaces the table entirely
    if let Some(error) = error.filter(|e| e.replaces_table()) {
        let paragraph = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(format!(" {}", error), styles::error_style())),
            Line::from(""),
            Line::from(Span::styled(" Press [r] to try again", styles::muted_style())),
        ])
        .wrap(Wrap { trim: false })
        .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let table_area = match error {
        Some(error) => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(1), Constraint::Min(3)])
                .split(area);
            let line = Line::from(Span::styled(format!(" {}", error), styles::error_style()));
            frame.render_widget(Paragraph::new(line), chunks[0]);
            chunks[1]
        }
        None => area,
    };

    if students.is_empty() {
        let message = match status {
            RosterStatus::Idle | RosterStatus::Loading => " Loading students...",
            RosterStatus::Loaded | RosterStatus::Errored => " No students yet. Press [a] to add one.",
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(message, styles::muted_style()))).block(block);
        frame.render_widget(paragraph, table_area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("No."),
        Cell::from("Name"),
        Cell::from("Section"),
        Cell::from("Gr"),
        Cell::from("Added"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = students
        .iter()
        .enumerate()
        .map(|(i, student)| {
            let style = if i == app.selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };

            Row::new(vec![
                Cell::from(truncate_string(&student.student_number, MAX_CELL_CHARS)),
                Cell::from(truncate_string(&student.display_name(), MAX_CELL_CHARS)),
                Cell::from(truncate_string(&student.section, MAX_CELL_CHARS)),
                Cell::from(format!("{:>2}", student.grade_str())),
                Cell::from(format_created(student.created_at.as_ref())),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(12),
        Constraint::Fill(3),
        Constraint::Fill(1),
        Constraint::Length(3),
        Constraint::Length(12),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.selection));

    frame.render_stateful_widget(table, table_area, &mut state);
}

fn table_title(status: RosterStatus, count: usize) -> String {
    let suffix = match status {
        RosterStatus::Loading => " - loading...",
        _ => "",
    };
    format!(" Students ({}){} - [a]dd [d]elete [r]efresh ", count, suffix)
}

fn render_draft_form(frame: &mut Frame, app: &App, area: Rect) {
    let editing = matches!(app.state, AppState::EditingDraft);
    let mut lines = vec![Line::from("")];

    for field in DraftField::ALL {
        let focused = editing && app.draft_focus == field;
        let value_style = if focused {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        let cursor = if focused { "▌" } else { "" };

        lines.push(Line::from(Span::styled(
            format!(" {}", field.label()),
            styles::muted_style(),
        )));
        lines.push(Line::from(vec![
            Span::raw(" "),
            Span::styled(format!("{}{}", app.draft.field(field), cursor), value_style),
        ]));
    }

    lines.push(Line::from(""));
    if editing && app.draft.grade_level().is_none() {
        lines.push(Line::from(Span::styled(
            " Grade level is not a number; it will be saved empty",
            styles::highlight_style(),
        )));
    }
    if editing {
        lines.push(Line::from(vec![
            Span::styled(" Enter", styles::help_key_style()),
            Span::styled(" save  ", styles::help_desc_style()),
            Span::styled("Tab", styles::help_key_style()),
            Span::styled(" next  ", styles::help_desc_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" back", styles::help_desc_style()),
        ]));
    } else {
        lines.push(Line::from(Span::styled(
            " Press [a] to fill in",
            styles::muted_style(),
        )));
    }

    let block = Block::default()
        .title(" New student ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(editing));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
