use super::*;

pub(super) fn render_form_view(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: tab header, form, status line, footer
    let chunks = Layout::vertical([
        Constraint::Length(2), // Tab header
        Constraint::Min(10),   // Form
        Constraint::Length(1), // Status line
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_tab_header(frame, ViewMode::Form, chunks[0]);
    render_form(frame, app, chunks[1]);
    render_status_line(frame, app, chunks[2]);
    render_form_footer(frame, chunks[3]);
}

fn render_form(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_FORM))
        .title(" New Analysis ")
        .title_style(Style::default().fg(BORDER_FORM).bold());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let custom_height = if app.is_custom_role() { 3 } else { 0 };
    let chunks = Layout::vertical([
        Constraint::Length(3),             // Document
        Constraint::Length(1),             // Selected document info
        Constraint::Length(5),             // Question
        Constraint::Length(3),             // Role preset
        Constraint::Length(custom_height), // Custom role
        Constraint::Length(3),             // Submit
        Constraint::Min(0),
    ])
    .split(inner.inner(Margin {
        vertical: 0,
        horizontal: 1,
    }));

    render_input(
        frame,
        chunks[0],
        " Document (.pdf, .epub, .md) ",
        &app.file_input,
        app.focus == FormField::File,
    );
    render_selected_file(frame, app, chunks[1]);
    render_input(
        frame,
        chunks[2],
        " Core research question ",
        &app.question_input,
        app.focus == FormField::Question,
    );
    render_role(frame, app, chunks[3]);
    if app.is_custom_role() {
        render_input(
            frame,
            chunks[4],
            " Custom role ",
            &app.custom_role_input,
            app.focus == FormField::CustomRole,
        );
    }
    render_submit(frame, app, chunks[5]);
}

/// Render a bordered text input; the focused one shows a cursor.
fn render_input(frame: &mut Frame, area: Rect, title: &str, value: &str, focused: bool) {
    let border_color = if focused { BORDER_FOCUS } else { Color::DarkGray };

    let mut spans = vec![Span::raw(value.to_string())];
    if focused {
        spans.push(Span::styled("▏", Style::default().fg(BORDER_FOCUS)));
    }

    let input = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(border_color))
                .title(title.to_string())
                .title_style(Style::default().fg(LABEL_COLOR)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(input, area);
}

fn render_selected_file(frame: &mut Frame, app: &App, area: Rect) {
    let line = match app.session.file() {
        Some(file) => Line::from(vec![
            Span::styled(" Selected: ", Style::default().fg(LABEL_COLOR)),
            Span::raw(file.name.clone()),
            Span::styled(
                format!("  {}  {}", format_bytes_opt(file.size), file.mime),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        None => Line::from(Span::styled(
            " No document selected",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_role(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == FormField::Role;
    let border_color = if focused { BORDER_FOCUS } else { Color::DarkGray };
    let arrow_style = if focused {
        Style::default().fg(BORDER_FOCUS)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let line = Line::from(vec![
        Span::styled("◀ ", arrow_style),
        Span::styled(app.role_preset().to_string(), Style::default().bold()),
        Span::styled(" ▶", arrow_style),
        Span::styled(
            format!("   {}/{}", app.role_index + 1, app.role_presets.len()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let role = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color))
            .title(" Research role ")
            .title_style(Style::default().fg(LABEL_COLOR)),
    );
    frame.render_widget(role, area);
}

fn render_submit(frame: &mut Frame, app: &App, area: Rect) {
    let submit = app.session.view.submit;
    let style = if submit.enabled {
        Style::default().fg(Color::Black).bg(Color::Green).bold()
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let button = Paragraph::new(Line::from(Span::styled(
        format!("  {}  ", submit.label),
        style,
    )))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(button, area);
}

fn render_form_footer(frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    spans.extend(key_hint("Tab", " next field  "));
    spans.extend(key_hint("←/→", " role  "));
    spans.extend(key_hint("Enter", " select/start  "));
    spans.extend(key_hint("Ctrl-S", " start  "));
    spans.extend(key_hint("Esc", " quit"));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
