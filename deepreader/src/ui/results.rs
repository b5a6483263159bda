use super::*;

pub(super) fn render_results_view(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Layout: tab header, report tabs, content, status line, footer
    let chunks = Layout::vertical([
        Constraint::Length(2), // Tab header
        Constraint::Length(2), // Report tabs
        Constraint::Min(5),    // Content
        Constraint::Length(1), // Status line
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_tab_header(frame, ViewMode::Results, chunks[0]);
    render_report_tabs(frame, app, chunks[1]);
    render_report_content(frame, app, chunks[2]);
    render_status_line(frame, app, chunks[3]);
    render_results_footer(frame, chunks[4]);
}

fn render_report_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let active = app.active_tab();
    let report = app.session.view.report.as_ref();

    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in ReportTab::ALL.iter().enumerate() {
        let has_content = report.is_some_and(|r| r.get(*tab).is_some());
        let style = if *tab == active {
            Style::default()
                .fg(BORDER_REPORT)
                .bold()
                .add_modifier(Modifier::UNDERLINED)
        } else if has_content {
            Style::default().fg(Color::Gray)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{} ", i + 1), Style::default().fg(Color::Yellow)));
        spans.push(Span::styled(tab.title(), style));
        spans.push(Span::raw("   "));
    }

    let tabs = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(tabs, area);
}

/// Style report Markdown line by line.
fn markdown_lines(content: &str) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();
    let mut in_code_block = false;

    for line in content.lines() {
        let styled_line = if line.starts_with("```") {
            // Toggle code block state
            in_code_block = !in_code_block;
            Line::from(Span::styled(line.to_string(), Style::default().fg(MD_CODE)))
        } else if in_code_block {
            Line::from(Span::styled(line.to_string(), Style::default().fg(MD_CODE)))
        } else if let Some(level) = heading_level(line) {
            let style = if level <= 2 {
                Style::default().fg(MD_HEADER).bold()
            } else {
                Style::default().fg(MD_HEADER)
            };
            Line::from(Span::styled(line.to_string(), style))
        } else if let Some(rest) = line.strip_prefix("**Answer:**") {
            Line::from(vec![
                Span::styled("Answer:", Style::default().fg(Color::Yellow).bold()),
                Span::raw(rest.to_string()),
            ])
        } else if line.starts_with("**") && line.ends_with("**") {
            Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(Color::Yellow),
            ))
        } else if line.len() > 1 && line.starts_with('_') && line.ends_with('_') {
            // Section brief
            Line::from(Span::styled(
                line.trim_matches('_').to_string(),
                Style::default().fg(Color::DarkGray).italic(),
            ))
        } else if line.starts_with("- ") || line.starts_with("* ") {
            Line::from(vec![
                Span::styled("• ", Style::default().fg(BORDER_REPORT)),
                Span::raw(line[2..].to_string()),
            ])
        } else {
            Line::raw(line.to_string())
        };
        lines.push(styled_line);
    }

    lines
}

/// ATX heading level of a line (`## Title` is 2).
fn heading_level(line: &str) -> Option<usize> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
        Some(hashes)
    } else {
        None
    }
}

fn render_report_content(frame: &mut Frame, app: &mut App, area: Rect) {
    let tab = app.active_tab();
    let paragraph =
        Paragraph::new(markdown_lines(app.active_report_text())).wrap(Wrap { trim: false });

    // Clamp scroll offset against wrapped rows, not source lines
    let row_count = paragraph.line_count(area.width.saturating_sub(2));
    let max_scroll = row_count.saturating_sub(area.height.saturating_sub(2) as usize);
    if app.result_scroll > max_scroll {
        app.result_scroll = max_scroll;
    }

    let paragraph = paragraph
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(BORDER_REPORT))
                .title(format!(" {} ", tab.title()))
                .title_style(Style::default().fg(BORDER_REPORT).bold()),
        )
        .scroll((u16::try_from(app.result_scroll).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, area);

    render_scrollbar(frame, area, row_count, app.result_scroll);
}

fn render_results_footer(frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    spans.extend(key_hint("1-4", " tab  "));
    spans.extend(key_hint("←/→", " switch  "));
    spans.extend(key_hint("j/k", " scroll  "));
    spans.extend(key_hint("n", " new analysis  "));
    spans.extend(key_hint("q", " quit"));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
