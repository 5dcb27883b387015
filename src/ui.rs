//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).
//!
//! ## For contributors
//!
//! * The layout is a grid of widget cards on top and a one-line status bar
//!   at the bottom.  Cards flow left to right, [`COLUMNS`] per row.
//! * A card only looks at its [`DisplayState`]'s status: every failure cause
//!   renders the same error indicator.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use livedash::{DisplayState, Status};

use crate::app::{App, WidgetView};

/// Cards per grid row.
pub const COLUMNS: usize = 3;

/// Draw the complete UI for one frame.
pub fn draw(app: &App, frame: &mut Frame) {
    let [main_area, status_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());

    draw_grid(app, frame, main_area);
    draw_status_bar(app, frame, status_area);
}

/// Lay the cards out row by row.
fn draw_grid(app: &App, frame: &mut Frame, area: Rect) {
    if app.widgets.is_empty() {
        return;
    }
    let rows = app.widgets.len().div_ceil(COLUMNS);
    let row_areas = Layout::vertical(vec![Constraint::Ratio(1, rows as u32); rows]).split(area);
    let selected = app.list_state.selected();

    for (row, chunk) in app.widgets.chunks(COLUMNS).enumerate() {
        let cells = Layout::horizontal(vec![Constraint::Ratio(1, COLUMNS as u32); COLUMNS])
            .split(row_areas[row]);
        for (col, view) in chunk.iter().enumerate() {
            let index = row * COLUMNS + col;
            draw_card(view, selected == Some(index), frame, cells[col]);
        }
    }
}

/// Render one widget: title, big value (or loading / error) and last update.
fn draw_card(view: &WidgetView, selected: bool, frame: &mut Frame, area: Rect) {
    let border = if selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .title(format!(" {} ", view.title))
        .borders(Borders::ALL)
        .border_style(border);

    let updated = view
        .updated_at
        .map(|t| format!("updated {}", t.format("%H:%M:%S")))
        .unwrap_or_default();

    let body = vec![
        Line::raw(""),
        headline(&view.state),
        Line::raw(""),
        Line::styled(updated, Style::default().fg(Color::DarkGray)),
    ];

    let card = Paragraph::new(body)
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(card, area);
}

fn headline(state: &DisplayState) -> Line<'static> {
    match (state.status(), state.value()) {
        (Status::Ready, Some(value)) => Line::styled(
            group_digits(value),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        (Status::Failed, _) => Line::styled("⚠ error", Style::default().fg(Color::Red)),
        _ => Line::styled("loading…", Style::default().fg(Color::DarkGray)),
    }
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled(&app.status, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(
            format!("{} ok", app.count(Status::Ready)),
            Style::default().fg(Color::Green),
        ),
        Span::raw(" "),
        Span::styled(
            format!("{} failing", app.count(Status::Failed)),
            Style::default().fg(Color::Red),
        ),
        Span::raw("  q: quit  ←/→: select  Home/End: jump"),
    ]));
    frame.render_widget(status, area);
}

/// `1234567` → `1,234,567`.
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
