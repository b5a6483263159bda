use super::*;
use deepreader_core::ValidationError;

impl App {
    // ========== Form View Methods ==========

    /// Handle keyboard input in the form view.
    pub(super) fn handle_form_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('s') {
                self.submit();
            }
            return;
        }

        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab | KeyCode::Down => {
                self.focus = self.next_field();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = self.previous_field();
            }
            KeyCode::Enter => match self.focus {
                FormField::File => {
                    if self.select_file() {
                        self.focus = FormField::Question;
                    }
                }
                FormField::Question => {
                    self.focus = FormField::Role;
                }
                FormField::Role | FormField::CustomRole => {
                    self.submit();
                }
            },
            KeyCode::Left if self.focus == FormField::Role => {
                self.cycle_role(false);
            }
            KeyCode::Right if self.focus == FormField::Role => {
                self.cycle_role(true);
            }
            KeyCode::Char('q') if self.focus == FormField::Role => {
                self.should_quit = true;
            }
            KeyCode::Char(c) => {
                if let Some(input) = self.focused_input() {
                    input.push(c);
                }
            }
            KeyCode::Backspace => {
                if let Some(input) = self.focused_input() {
                    input.pop();
                }
            }
            _ => {}
        }
    }

    /// Text buffer behind the focused field, if it is a text field.
    fn focused_input(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::File => Some(&mut self.file_input),
            FormField::Question => Some(&mut self.question_input),
            FormField::CustomRole => Some(&mut self.custom_role_input),
            FormField::Role => None,
        }
    }

    fn visible_fields(&self) -> &'static [FormField] {
        if self.is_custom_role() {
            &[
                FormField::File,
                FormField::Question,
                FormField::Role,
                FormField::CustomRole,
            ]
        } else {
            &[FormField::File, FormField::Question, FormField::Role]
        }
    }

    fn next_field(&self) -> FormField {
        let fields = self.visible_fields();
        let index = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        fields[(index + 1) % fields.len()]
    }

    fn previous_field(&self) -> FormField {
        let fields = self.visible_fields();
        let index = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        fields[(index + fields.len() - 1) % fields.len()]
    }

    fn cycle_role(&mut self, forward: bool) {
        let count = self.role_presets.len().max(1);
        self.role_index = if forward {
            (self.role_index + 1) % count
        } else {
            (self.role_index + count - 1) % count
        };
    }

    /// Validate the typed path and hand it to the session.
    ///
    /// Returns whether the document is now selected. Rejections are
    /// surfaced through the session alert.
    pub(super) fn select_file(&mut self) -> bool {
        if self.file_input.trim().is_empty() {
            self.session.view.alert = Some(ValidationError::NoFile.to_string());
            return false;
        }

        let file = match self.selected_file_from_input() {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(input = %self.file_input, error = %e, "Document rejected");
                self.session.view.alert = Some(e.to_string());
                return false;
            }
        };

        // A finished run restarts from idle once a new document is picked.
        if self.session.select_file(file).is_err() {
            return false;
        }
        self.notice = None;
        true
    }

    /// Validate the form and launch the run.
    pub(super) fn submit(&mut self) {
        let needs_selection = !self.session.phase().is_busy()
            && !self.file_input.trim().is_empty()
            && !self.selected_matches_input();
        if needs_selection && !self.select_file() {
            self.focus = FormField::File;
            return;
        }

        match self.session.submit(&self.form()) {
            Ok(submission) => self.launch(submission),
            Err(e) => {
                tracing::debug!(error = %e, "Submission rejected");
            }
        }
    }
}

