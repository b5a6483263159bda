//! UI rendering for the TUI.

use deepreader_core::format::{format_bytes_opt, format_elapsed};
use deepreader_core::session::{LogEntry, LogLevel};
use deepreader_core::{Node, NodeStatus, ReportTab};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Gauge, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
    Frame,
};

use crate::app::{App, FormField, ViewMode};

mod form;
mod progress;
mod results;

// ========== Standard View Colors ==========

/// Border color for the form block
const BORDER_FORM: Color = Color::Rgb(0, 150, 150);
/// Border color for the focused input
const BORDER_FOCUS: Color = Color::Rgb(255, 215, 0);
/// Border color for progress blocks
const BORDER_PROGRESS: Color = Color::Rgb(80, 160, 80);
/// Border color for report content
const BORDER_REPORT: Color = Color::Rgb(180, 100, 180);
/// Label color for field titles and metadata
const LABEL_COLOR: Color = Color::Rgb(100, 180, 180);
/// Gauge background
const GAUGE_BG: Color = Color::Rgb(40, 40, 40);
/// Markdown header color
const MD_HEADER: Color = Color::Rgb(255, 180, 100);
/// Markdown code block color
const MD_CODE: Color = Color::Rgb(150, 150, 150);

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    match app.view_mode {
        ViewMode::Form => form::render_form_view(frame, app),
        ViewMode::Progress => progress::render_progress_view(frame, app),
        ViewMode::Results => results::render_results_view(frame, app),
    }
}

/// Render the header with the app name and the Form, Progress and Results
/// stages.
fn render_tab_header(frame: &mut Frame, active: ViewMode, area: Rect) {
    // Layout: app name on left, tabs in center/right
    let chunks = Layout::horizontal([
        Constraint::Length(13), // App name
        Constraint::Min(1),     // Tabs
    ])
    .split(area);

    // App name
    let app_name = Paragraph::new(" deepreader").style(Style::default().fg(Color::Cyan).bold());
    frame.render_widget(app_name, chunks[0]);

    // Tab styling
    let active_style = Style::default()
        .fg(Color::Cyan)
        .bold()
        .add_modifier(Modifier::UNDERLINED);
    let inactive_style = Style::default().fg(Color::DarkGray);

    let mut spans = Vec::new();
    for (mode, label) in [
        (ViewMode::Form, " Form "),
        (ViewMode::Progress, " Progress "),
        (ViewMode::Results, " Results "),
    ] {
        if !spans.is_empty() {
            spans.push(Span::raw("  "));
        }
        let style = if mode == active {
            active_style
        } else {
            inactive_style
        };
        spans.push(Span::styled(label, style));
    }

    let tabs_para =
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(tabs_para, chunks[1]);
}

/// Render the status line: errors in red, notices in yellow, the saved
/// report location in green.
fn render_status_line(frame: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(alert) = app.session.view.alert.as_deref() {
        Line::from(vec![
            Span::styled(" ✗ ", Style::default().fg(Color::Red).bold()),
            Span::styled(alert.to_string(), Style::default().fg(Color::Red)),
        ])
    } else if let Some(notice) = app.notice.as_deref() {
        Line::from(vec![
            Span::styled(" ! ", Style::default().fg(Color::Yellow).bold()),
            Span::styled(notice.to_string(), Style::default().fg(Color::Yellow)),
        ])
    } else if let Some(dir) = &app.saved_to {
        Line::from(vec![
            Span::styled(" ✓ ", Style::default().fg(Color::Green).bold()),
            Span::styled("Report saved to ", Style::default().fg(Color::DarkGray)),
            Span::styled(dir.display().to_string(), Style::default().fg(Color::Green)),
        ])
    } else {
        Line::raw("")
    };

    frame.render_widget(Paragraph::new(line), area);
}

/// Key hint for a footer: yellow key, plain description.
fn key_hint<'a>(key: &'a str, description: &'a str) -> [Span<'a>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Yellow)),
        Span::raw(description),
    ]
}

/// Render a vertical scrollbar along the right border of `area`.
fn render_scrollbar(frame: &mut Frame, area: Rect, content_length: usize, position: usize) {
    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
        .begin_symbol(Some("↑"))
        .end_symbol(Some("↓"));

    let mut scrollbar_state = ScrollbarState::new(content_length).position(position);

    frame.render_stateful_widget(
        scrollbar,
        area.inner(Margin {
            vertical: 1,
            horizontal: 0,
        }),
        &mut scrollbar_state,
    );
}
