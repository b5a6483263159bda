use super::*;

impl App {
    // ========== Results View Methods ==========

    /// Handle keyboard input in the results view.
    pub(super) fn handle_results_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('n') => {
                self.new_session();
            }
            KeyCode::Char(c @ '1'..='4') => {
                let index = (c as usize) - ('1' as usize);
                self.show_tab(ReportTab::ALL[index]);
            }
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => {
                self.show_tab(self.active_tab().next());
            }
            KeyCode::Left | KeyCode::Char('h') | KeyCode::BackTab => {
                self.show_tab(self.active_tab().previous());
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.result_scroll = self.result_scroll.saturating_add(1);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.result_scroll = self.result_scroll.saturating_sub(1);
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.result_scroll = 0;
            }
            KeyCode::End | KeyCode::Char('G') => {
                // Will be clamped during rendering
                self.result_scroll = usize::MAX;
            }
            KeyCode::PageDown | KeyCode::Char('d') | KeyCode::Char(' ') => {
                self.result_scroll = self.result_scroll.saturating_add(10);
            }
            KeyCode::PageUp | KeyCode::Char('u') => {
                self.result_scroll = self.result_scroll.saturating_sub(10);
            }
            _ => {}
        }
    }

    fn show_tab(&mut self, tab: ReportTab) {
        if tab != self.active_tab() {
            self.session.switch_tab(tab);
            self.result_scroll = 0;
        }
    }

    /// Markdown of the active tab, or its placeholder.
    pub fn active_report_text(&self) -> &str {
        let tab = self.active_tab();
        match &self.session.view.report {
            Some(report) => report.text(tab),
            None => tab.placeholder(),
        }
    }

    /// Write the report bundle for a completed run, if enabled.
    pub(super) fn save_report(&mut self) {
        if !self.config.output.save_reports {
            return;
        }
        let view = &self.session.view;
        let (Some(final_state), Some(report)) = (&view.final_state, &view.report) else {
            return;
        };

        let stem = self
            .session
            .file()
            .map(SelectedFile::stem)
            .unwrap_or_else(|| "report".to_string());

        match export::write_bundle(
            &self.config.output.reports_dir(),
            &stem,
            final_state,
            report,
            &self.config.render,
        ) {
            Ok(summary) => {
                self.saved_to = Some(summary.dir);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save report bundle");
                self.notice = Some(format!("Failed to save report: {}", e));
            }
        }
    }
}
