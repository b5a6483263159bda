use super::*;

pub(super) fn render_progress_view(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: tab header, gauge, status, stages, log, status line, footer
    let chunks = Layout::vertical([
        Constraint::Length(2), // Tab header
        Constraint::Length(3), // Gauge
        Constraint::Length(1), // Status text
        Constraint::Length(3), // Stage indicators
        Constraint::Min(5),    // Log
        Constraint::Length(1), // Status line
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_tab_header(frame, ViewMode::Progress, chunks[0]);
    render_gauge(frame, app, chunks[1]);
    render_status_text(frame, app, chunks[2]);
    render_nodes(frame, app, chunks[3]);
    render_log(frame, app, chunks[4]);
    render_status_line(frame, app, chunks[5]);
    render_progress_footer(frame, app, chunks[6]);
}

fn render_gauge(frame: &mut Frame, app: &App, area: Rect) {
    let percent = app.session.view.percent;

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(BORDER_PROGRESS))
                .title(" Progress ")
                .title_style(Style::default().fg(BORDER_PROGRESS).bold()),
        )
        .gauge_style(Style::default().fg(BORDER_PROGRESS).bg(GAUGE_BG))
        .percent(u16::from(percent.min(100)))
        .label(Span::styled(
            format!("{}%", percent),
            Style::default().fg(Color::White).bold(),
        ));
    frame.render_widget(gauge, area);
}

fn render_status_text(frame: &mut Frame, app: &App, area: Rect) {
    let view = &app.session.view;
    let status = if view.status.is_empty() {
        view.submit.label.to_string()
    } else {
        view.status.clone()
    };

    let mut spans = vec![Span::styled(format!(" {}", status), Style::default().bold())];
    if let Some(started) = app.started_at {
        spans.push(Span::styled(
            format!("  ({})", format_elapsed(started.elapsed())),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(task_id) = app.session.task_id() {
        spans.push(Span::styled(
            format!("  task {}", task_id),
            Style::default().fg(Color::DarkGray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn node_style(status: NodeStatus) -> (&'static str, Style) {
    match status {
        NodeStatus::Inactive => ("○", Style::default().fg(Color::DarkGray)),
        NodeStatus::Active => ("◉", Style::default().fg(Color::Yellow).bold()),
        NodeStatus::Done => ("✓", Style::default().fg(Color::Green)),
    }
}

fn render_nodes(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, node) in Node::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  →  ", Style::default().fg(Color::DarkGray)));
        }
        let (symbol, style) = node_style(app.session.view.nodes.get(*node));
        spans.push(Span::styled(format!("{} {}", symbol, node.label()), style));
    }

    let nodes = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Stages ")
            .title_style(Style::default().fg(LABEL_COLOR)),
    );
    frame.render_widget(nodes, area);
}

fn log_line(entry: &LogEntry) -> Line<'static> {
    let style = match entry.level {
        LogLevel::Info => Style::default(),
        LogLevel::Success => Style::default().fg(Color::Green),
        LogLevel::Error => Style::default().fg(Color::Red),
        LogLevel::Debug => Style::default().fg(Color::DarkGray),
    };
    Line::from(Span::styled(entry.display(), style))
}

/// Render the log, newest at the bottom, always scrolled to the end.
fn render_log(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app.session.view.log.iter().map(log_line).collect();

    let visible = area.height.saturating_sub(2) as usize;
    let offset = lines.len().saturating_sub(visible);

    let log = Paragraph::new(lines.clone())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(BORDER_PROGRESS))
                .title(format!(" Log ({}) ", lines.len()))
                .title_style(Style::default().fg(BORDER_PROGRESS).bold()),
        )
        .scroll((offset as u16, 0));
    frame.render_widget(log, area);

    if offset > 0 {
        render_scrollbar(frame, area, lines.len(), offset);
    }
}

fn render_progress_footer(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    if !app.session.phase().is_busy() {
        spans.extend(key_hint("Esc", " back to form  "));
    }
    spans.extend(key_hint("q", " quit  "));
    spans.push(Span::raw("│ "));
    spans.push(Span::styled(
        app.session.view.submit.label,
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
