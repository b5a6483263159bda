//! Application state for the TUI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use deepreader_core::channel::{self, ChannelHandle, ChannelMessage};
use deepreader_core::config::CUSTOM_ROLE;
use deepreader_core::{
    export, Config, Error, ReportTab, ResearchClient, ResearchForm, SelectedFile, Session,
    Submission, TaskId, Transition,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

mod form;
mod results;

/// Shown on the progress view when a run completes without a final state.
const NO_REPORT_NOTICE: &str = "The backend returned no report.";

/// Current view mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    /// Document, question and role input
    #[default]
    Form,
    /// Progress bar, stage indicators and log of a running analysis
    Progress,
    /// Tabbed report of a finished analysis
    Results,
}

/// Focusable form field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormField {
    #[default]
    File,
    Question,
    Role,
    CustomRole,
}

/// Outcome of a setup request, reported by the launch task.
#[derive(Debug)]
pub enum UiEvent {
    Uploaded { filename: String },
    Started { task_id: TaskId },
    RequestFailed(Error),
}

/// Main application state.
pub struct App {
    config: Config,
    client: Arc<ResearchClient>,
    runtime: Handle,
    /// State machine behind every view
    pub session: Session,
    /// Current view mode
    pub view_mode: ViewMode,

    // ========== Form State ==========
    /// Field with keyboard focus
    pub focus: FormField,
    /// Document path as typed
    pub file_input: String,
    /// Question as typed
    pub question_input: String,
    /// Role presets, `Custom` last
    pub role_presets: Vec<String>,
    /// Index into `role_presets`
    pub role_index: usize,
    /// Custom role as typed
    pub custom_role_input: String,

    // ========== Run State ==========
    /// When the current run was submitted
    pub started_at: Option<Instant>,
    /// Progress channel of the current run
    channel: Option<ChannelHandle>,
    /// Report bundle written for the current run
    pub saved_to: Option<PathBuf>,
    /// Non-fatal notice shown in the status line (e.g. export failure)
    pub notice: Option<String>,
    /// Scroll offset for the results view
    pub result_scroll: usize,

    ui_tx: UnboundedSender<UiEvent>,
    ui_rx: UnboundedReceiver<UiEvent>,
    channel_tx: UnboundedSender<ChannelMessage>,
    channel_rx: UnboundedReceiver<ChannelMessage>,

    /// Whether the app should exit
    pub should_quit: bool,
}

impl App {
    /// Create a new App. Network tasks are spawned on `runtime`.
    pub fn new(config: Config, client: ResearchClient, runtime: Handle) -> Self {
        let role_presets = config.form.presets();
        let role_index = config.form.default_index();
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (channel_tx, channel_rx) = mpsc::unbounded_channel();

        Self {
            config,
            client: Arc::new(client),
            runtime,
            session: Session::new(),
            view_mode: ViewMode::Form,
            focus: FormField::File,
            file_input: String::new(),
            question_input: String::new(),
            role_presets,
            role_index,
            custom_role_input: String::new(),
            started_at: None,
            channel: None,
            saved_to: None,
            notice: None,
            result_scroll: 0,
            ui_tx,
            ui_rx,
            channel_tx,
            channel_rx,
            should_quit: false,
        }
    }

    /// Selected preset label.
    pub fn role_preset(&self) -> &str {
        self.role_presets
            .get(self.role_index)
            .map(String::as_str)
            .unwrap_or(CUSTOM_ROLE)
    }

    pub fn is_custom_role(&self) -> bool {
        self.role_preset() == CUSTOM_ROLE
    }

    /// Current form input.
    pub fn form(&self) -> ResearchForm {
        ResearchForm {
            question: self.question_input.clone(),
            role_preset: self.role_preset().to_string(),
            custom_role: self.custom_role_input.clone(),
        }
    }

    // ========== Prefill (command line) ==========

    pub fn prefill_file(&mut self, path: &Path) {
        self.file_input = path.display().to_string();
        self.select_file();
        self.focus = FormField::Question;
    }

    pub fn prefill_question(&mut self, question: &str) {
        self.question_input = question.to_string();
    }

    /// Select a matching preset, or switch to a custom role.
    pub fn prefill_role(&mut self, role: &str) {
        match self.role_presets.iter().position(|p| p == role) {
            Some(index) => self.role_index = index,
            None => {
                self.role_index = self.role_presets.len().saturating_sub(1);
                self.custom_role_input = role.to_string();
            }
        }
    }

    // ========== Event Handling ==========

    /// Handle keyboard input.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.view_mode {
            ViewMode::Form => self.handle_form_key(key),
            ViewMode::Progress => self.handle_progress_key(key),
            ViewMode::Results => self.handle_results_key(key),
        }
    }

    /// Handle keyboard input while a run is in flight.
    fn handle_progress_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Esc if !self.session.phase().is_busy() => {
                self.view_mode = ViewMode::Form;
            }
            _ => {}
        }
    }

    /// Apply everything the network tasks reported.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            self.apply_ui_event(event);
        }
        while let Ok(message) = self.channel_rx.try_recv() {
            self.apply_channel_message(message);
        }
    }

    fn apply_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Uploaded { filename } => {
                self.session.upload_succeeded(&filename);
            }
            UiEvent::Started { task_id } => {
                self.session.start_succeeded(task_id.clone());
                if self.session.task_id() == Some(&task_id) {
                    self.open_channel(task_id);
                }
            }
            UiEvent::RequestFailed(error) => {
                self.session.request_failed(&error);
                self.view_mode = ViewMode::Form;
            }
        }
    }

    fn apply_channel_message(&mut self, message: ChannelMessage) {
        match self.session.handle(&message.task_id, message.event) {
            Transition::Completed => {
                self.close_channel();
                if self.session.view.report.is_none() {
                    self.notice = Some(NO_REPORT_NOTICE.to_string());
                    return;
                }
                self.view_mode = ViewMode::Results;
                self.result_scroll = 0;
                self.save_report();
            }
            // Stay on the progress view so the log stays readable.
            Transition::Failed => {
                self.close_channel();
            }
            Transition::Updated | Transition::Unchanged => {}
        }
    }

    // ========== Run Control ==========

    /// Upload then start on the runtime; results come back as [`UiEvent`]s.
    fn launch(&mut self, submission: Submission) {
        self.close_channel();
        self.started_at = Some(Instant::now());
        self.saved_to = None;
        self.notice = None;
        self.view_mode = ViewMode::Progress;

        let client = Arc::clone(&self.client);
        let tx = self.ui_tx.clone();
        self.runtime.spawn(async move {
            let filename = match client.upload(&submission.file).await {
                Ok(filename) => filename,
                Err(e) => {
                    let _ = tx.send(UiEvent::RequestFailed(e));
                    return;
                }
            };
            let _ = tx.send(UiEvent::Uploaded {
                filename: filename.clone(),
            });

            let event = match client
                .start_research(&filename, &submission.question, &submission.role)
                .await
            {
                Ok(task_id) => UiEvent::Started { task_id },
                Err(e) => UiEvent::RequestFailed(e),
            };
            let _ = tx.send(event);
        });
    }

    fn open_channel(&mut self, task_id: TaskId) {
        self.close_channel();
        let url = self.client.channel_url(&task_id);
        self.channel = Some(channel::spawn_on(
            &self.runtime,
            url,
            task_id,
            self.config.server.channel_idle_timeout(),
            self.channel_tx.clone(),
        ));
    }

    fn close_channel(&mut self) {
        if let Some(channel) = self.channel.take() {
            tracing::debug!(task_id = %channel.task_id(), "Closing progress channel");
            channel.close();
        }
    }

    /// Forget the finished run and go back to the form.
    ///
    /// Question and role are kept; the document has to be selected again.
    pub fn new_session(&mut self) {
        if self.session.phase().is_busy() {
            return;
        }
        self.close_channel();
        self.session = Session::new();
        self.view_mode = ViewMode::Form;
        self.focus = FormField::File;
        self.file_input.clear();
        self.started_at = None;
        self.saved_to = None;
        self.notice = None;
        self.result_scroll = 0;
    }

    /// Status line text: the session alert wins over notices.
    pub fn status_message(&self) -> Option<&str> {
        self.session
            .view
            .alert
            .as_deref()
            .or(self.notice.as_deref())
    }

    pub fn active_tab(&self) -> ReportTab {
        self.session.view.active_tab
    }

    fn selected_matches_input(&self) -> bool {
        self.session
            .file()
            .is_some_and(|file| file.path == Path::new(self.file_input.trim()))
    }

    fn selected_file_from_input(&self) -> deepreader_core::Result<SelectedFile> {
        SelectedFile::from_disk(expand_home(self.file_input.trim()))
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(input: &str) -> PathBuf {
    match input.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(input)),
        None => PathBuf::from(input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepreader_core::{ChannelEvent, Phase, ProgressEvent};
    use serde_json::json;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app(runtime: &tokio::runtime::Runtime) -> App {
        let mut config = Config::default();
        config.output.save_reports = false;
        let client = ResearchClient::new(&config.server).unwrap();
        App::new(config, client, runtime.handle().clone())
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_focus_skips_custom_role_for_presets() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = test_app(&runtime);
        assert!(!app.is_custom_role());

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, FormField::Question);
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, FormField::Role);
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, FormField::File);
        app.handle_key(key(KeyCode::BackTab));
        assert_eq!(app.focus, FormField::Role);
    }

    #[test]
    fn test_role_cycles_to_custom() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = test_app(&runtime);
        app.focus = FormField::Role;

        app.handle_key(key(KeyCode::Left));
        assert_eq!(app.role_preset(), CUSTOM_ROLE);
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, FormField::CustomRole);

        type_text(&mut app, "Historian");
        assert_eq!(app.form().role().unwrap(), "Historian");

        app.handle_key(key(KeyCode::BackTab));
        assert_eq!(app.focus, FormField::Role);
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.role_index, 0);
    }

    #[test]
    fn test_prefill_role() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = test_app(&runtime);

        app.prefill_role("Policy Advisor");
        assert_eq!(app.role_preset(), "Policy Advisor");

        app.prefill_role("Marine biologist");
        assert!(app.is_custom_role());
        assert_eq!(app.custom_role_input, "Marine biologist");
    }

    #[test]
    fn test_unsupported_file_is_surfaced() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = test_app(&runtime);

        type_text(&mut app, "notes.txt");
        app.handle_key(key(KeyCode::Enter));

        assert!(app.session.file().is_none());
        assert!(app
            .status_message()
            .is_some_and(|m| m.contains("Unsupported file type")));
        assert_eq!(app.focus, FormField::File);
    }

    #[test]
    fn test_empty_question_does_not_launch() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "# A").unwrap();

        let mut app = test_app(&runtime);
        app.prefill_file(&path);
        assert!(app.session.file().is_some());

        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert_eq!(app.view_mode, ViewMode::Form);
        assert_eq!(app.session.phase(), Phase::Idle);
        assert!(app.status_message().is_some());
    }

    #[test]
    fn test_completion_switches_to_results() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = test_app(&runtime);
        app.session.select_path("a.pdf").unwrap();
        app.session
            .submit(&ResearchForm {
                question: "q".to_string(),
                role_preset: "Policy Advisor".to_string(),
                custom_role: String::new(),
            })
            .unwrap();
        app.view_mode = ViewMode::Progress;
        app.apply_ui_event(UiEvent::Uploaded {
            filename: "a.pdf".to_string(),
        });
        app.session.start_succeeded(TaskId::from("T1"));

        let completion: ProgressEvent = serde_json::from_value(json!({
            "type": "completion",
            "final_state": {"chapter_summaries": {"One": "Text"}}
        }))
        .unwrap();
        app.apply_channel_message(ChannelMessage {
            task_id: TaskId::from("T1"),
            event: ChannelEvent::Frame(completion),
        });

        assert_eq!(app.view_mode, ViewMode::Results);
        assert_eq!(app.session.phase(), Phase::Completed);

        app.handle_key(key(KeyCode::Char('2')));
        assert_eq!(app.active_tab(), ReportTab::ChapterSummaries);
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.active_tab(), ReportTab::ThematicAnalysis);

        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.view_mode, ViewMode::Form);
        assert_eq!(app.session.phase(), Phase::Idle);
        assert!(app.session.view.report.is_none());
    }

    #[test]
    fn test_completion_without_final_state_stays_on_progress() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = test_app(&runtime);
        app.session.select_path("a.pdf").unwrap();
        app.session
            .submit(&ResearchForm {
                question: "q".to_string(),
                role_preset: "Policy Advisor".to_string(),
                custom_role: String::new(),
            })
            .unwrap();
        app.view_mode = ViewMode::Progress;
        app.session.upload_succeeded("a.pdf");
        app.session.start_succeeded(TaskId::from("T1"));

        let completion: ProgressEvent =
            serde_json::from_value(json!({"type": "completion"})).unwrap();
        app.apply_channel_message(ChannelMessage {
            task_id: TaskId::from("T1"),
            event: ChannelEvent::Frame(completion),
        });

        assert_eq!(app.session.phase(), Phase::Completed);
        assert!(app.session.view.report.is_none());
        assert_eq!(app.view_mode, ViewMode::Progress);
        assert_eq!(app.status_message(), Some(NO_REPORT_NOTICE));

        // Finished, so Esc goes back to the form
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.view_mode, ViewMode::Form);
    }

    #[test]
    fn test_ctrl_c_quits_from_any_view() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = test_app(&runtime);
        app.view_mode = ViewMode::Progress;
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }
}
