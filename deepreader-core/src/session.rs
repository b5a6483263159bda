//! Session state machine and view state.
//!
//! A [`Session`] owns everything the UI displays. Network code never touches
//! it directly: results come back as calls to [`Session::upload_succeeded`],
//! [`Session::start_succeeded`], [`Session::request_failed`] and
//! [`Session::handle`], all made from the thread that owns the session.
//!
//! ```text
//! idle -> uploading -> starting -> streaming -> completed
//!           \             \            \
//!            +-------------+------------+--> failed (submit re-enabled)
//! ```

use chrono::{DateTime, Local};
use serde_json::Value;
use uuid::Uuid;

use crate::channel::ChannelEvent;
use crate::config::CUSTOM_ROLE;
use crate::error::{Error, ValidationError};
use crate::report::{ReportTab, ReportTabs};
use crate::types::{Node, NodeBoard, ProgressEvent, SelectedFile, Submission, TaskId};

pub const SUBMIT_LABEL: &str = "Start deep analysis";
pub const UPLOADING_LABEL: &str = "Uploading...";
pub const STARTING_LABEL: &str = "Starting analysis...";
pub const RUNNING_LABEL: &str = "Analysis running...";
pub const COMPLETE_STATUS: &str = "Analysis complete!";

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Starting,
    Streaming,
    Completed,
    Failed,
}

impl Phase {
    /// A run is in flight and owns the backend task.
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Uploading | Phase::Starting | Phase::Streaming)
    }

    pub fn can_submit(self) -> bool {
        matches!(self, Phase::Idle | Phase::Failed)
    }
}

/// Severity of a progress log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Debug,
}

/// One line of the progress log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// `[HH:MM:SS] message`
    pub fn display(&self) -> String {
        format!("[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// State of the submit control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitControl {
    pub enabled: bool,
    pub label: &'static str,
}

impl Default for SubmitControl {
    fn default() -> Self {
        Self {
            enabled: true,
            label: SUBMIT_LABEL,
        }
    }
}

/// Everything the UI renders for a session.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// Progress percentage, 0-100
    pub percent: u8,
    /// Status text under the progress bar
    pub status: String,
    pub nodes: NodeBoard,
    /// Append-only progress log for the current run
    pub log: Vec<LogEntry>,
    pub progress_visible: bool,
    pub submit: SubmitControl,
    /// Most recent error surfaced to the user
    pub alert: Option<String>,
    /// Rendered result tabs, once a completion carried a report
    pub report: Option<ReportTabs>,
    /// Raw `final_state`, kept for export
    pub final_state: Option<Value>,
    pub active_tab: ReportTab,
}

impl ViewState {
    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.log.push(LogEntry {
            at: Local::now(),
            level,
            message: message.into(),
        });
    }

    fn set_progress(&mut self, progress: i64, status: &str) {
        self.percent = progress.clamp(0, 100) as u8;
        self.status = status.to_string();
    }
}

/// Raw form input, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchForm {
    pub question: String,
    /// Selected preset; [`CUSTOM_ROLE`] switches to `custom_role`
    pub role_preset: String,
    pub custom_role: String,
}

impl ResearchForm {
    /// Effective research role.
    ///
    /// Presets are used verbatim; the custom role is trimmed and must not be
    /// empty.
    pub fn role(&self) -> Result<String, ValidationError> {
        if self.role_preset == CUSTOM_ROLE {
            let custom = self.custom_role.trim();
            if custom.is_empty() {
                return Err(ValidationError::EmptyRole);
            }
            return Ok(custom.to_string());
        }
        if self.role_preset.is_empty() {
            return Err(ValidationError::EmptyRole);
        }
        Ok(self.role_preset.clone())
    }
}

/// What a handled event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing visible changed
    Unchanged,
    /// View state changed, phase did not
    Updated,
    /// The run finished successfully
    Completed,
    /// The run failed; submit is enabled again
    Failed,
}

/// One client session.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    phase: Phase,
    file: Option<SelectedFile>,
    task_id: Option<TaskId>,
    uploaded_as: Option<String>,
    pub view: ViewState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Idle,
            file: None,
            task_id: None,
            uploaded_as: None,
            view: ViewState::default(),
        }
    }

    /// Local identifier, used to correlate log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    /// Task the current run is bound to.
    pub fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    /// Name the backend stored the upload under.
    pub fn uploaded_as(&self) -> Option<&str> {
        self.uploaded_as.as_deref()
    }

    /// Record a document selection.
    ///
    /// On rejection the error is surfaced and nothing else changes. Selecting
    /// after a finished or failed run starts over from idle.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), ValidationError> {
        if self.phase.is_busy() {
            return Err(self.reject(ValidationError::Busy));
        }

        if self.phase != Phase::Idle {
            self.reset_run();
        }

        tracing::debug!(session = %self.id, file = %file.name, "Document selected");
        self.file = Some(file);
        self.view.alert = None;
        Ok(())
    }

    /// Validate a path and select it.
    pub fn select_path(&mut self, path: impl Into<std::path::PathBuf>) -> Result<(), ValidationError> {
        match SelectedFile::new(path) {
            Ok(file) => self.select_file(file),
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Validate the form and enter `uploading`.
    ///
    /// On rejection the error is surfaced and nothing else changes, so the
    /// user can fix the input and retry.
    pub fn submit(&mut self, form: &ResearchForm) -> Result<Submission, ValidationError> {
        let submission = match self.validate(form) {
            Ok(submission) => submission,
            Err(e) => return Err(self.reject(e)),
        };

        self.phase = Phase::Uploading;
        self.task_id = None;
        self.uploaded_as = None;
        self.view = ViewState {
            submit: SubmitControl {
                enabled: false,
                label: UPLOADING_LABEL,
            },
            ..ViewState::default()
        };

        tracing::info!(
            session = %self.id,
            file = %submission.file.name,
            role = %submission.role,
            "Submitting analysis"
        );
        Ok(submission)
    }

    fn validate(&self, form: &ResearchForm) -> Result<Submission, ValidationError> {
        match self.phase {
            Phase::Completed => return Err(ValidationError::Finished),
            p if p.is_busy() => return Err(ValidationError::Busy),
            _ => {}
        }
        let file = self.file.clone().ok_or(ValidationError::NoFile)?;
        let question = form.question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        let role = form.role()?;
        Ok(Submission {
            file,
            question: question.to_string(),
            role,
        })
    }

    fn reject(&mut self, error: ValidationError) -> ValidationError {
        tracing::debug!(session = %self.id, error = %error, "Input rejected");
        self.view.alert = Some(error.to_string());
        error
    }

    /// The upload finished; the start request follows.
    pub fn upload_succeeded(&mut self, filename: &str) {
        if self.phase != Phase::Uploading {
            tracing::warn!(session = %self.id, phase = ?self.phase, "Ignoring late upload result");
            return;
        }
        self.phase = Phase::Starting;
        self.uploaded_as = Some(filename.to_string());
        self.view.submit.label = STARTING_LABEL;
        tracing::info!(session = %self.id, filename, "Upload complete");
    }

    /// The backend accepted the task; the progress channel opens next.
    pub fn start_succeeded(&mut self, task_id: TaskId) {
        if self.phase != Phase::Starting {
            tracing::warn!(session = %self.id, phase = ?self.phase, "Ignoring late start result");
            return;
        }
        tracing::info!(session = %self.id, task_id = %task_id, "Analysis task started");
        self.phase = Phase::Streaming;
        self.view.submit.label = RUNNING_LABEL;
        self.view.progress_visible = true;
        self.view
            .log(LogLevel::Info, format!("Task {} started", task_id));
        self.task_id = Some(task_id);
    }

    /// Upload or start failed: abort the run and re-enable submit.
    pub fn request_failed(&mut self, error: &Error) {
        if !matches!(self.phase, Phase::Uploading | Phase::Starting) {
            tracing::warn!(session = %self.id, phase = ?self.phase, error = %error, "Ignoring late request failure");
            return;
        }
        tracing::warn!(session = %self.id, phase = ?self.phase, error = %error, "Request failed");
        self.fail(error.to_string());
    }

    fn fail(&mut self, message: String) {
        self.phase = Phase::Failed;
        self.view.alert = Some(message);
        self.view.submit = SubmitControl::default();
    }

    /// Apply one progress channel event.
    ///
    /// Events for any task other than the current one are ignored.
    pub fn handle(&mut self, task_id: &TaskId, event: ChannelEvent) -> Transition {
        if self.task_id.as_ref() != Some(task_id) {
            tracing::debug!(session = %self.id, task_id = %task_id, "Dropping event from stale channel");
            return Transition::Unchanged;
        }

        match event {
            ChannelEvent::Opened => {
                self.view.log(LogLevel::Info, "Progress channel connected");
                Transition::Updated
            }
            ChannelEvent::Closed => {
                self.view.log(LogLevel::Info, "Progress channel closed");
                Transition::Updated
            }
            ChannelEvent::TransportError(e) => {
                tracing::warn!(session = %self.id, task_id = %task_id, error = %e, "Progress channel error");
                self.view.log(LogLevel::Error, "Progress channel error");
                Transition::Updated
            }
            ChannelEvent::Malformed { error } => {
                tracing::warn!(session = %self.id, task_id = %task_id, error = %error, "Failed to parse progress frame");
                Transition::Unchanged
            }
            ChannelEvent::Stalled(idle) => {
                if self.phase != Phase::Streaming {
                    return Transition::Unchanged;
                }
                let message = format!("No progress received for {}s", idle.as_secs());
                tracing::warn!(session = %self.id, task_id = %task_id, "{}", message);
                self.view.log(LogLevel::Error, format!("Error: {}", message));
                self.fail(message);
                Transition::Failed
            }
            ChannelEvent::Frame(frame) => self.dispatch(frame),
        }
    }

    fn dispatch(&mut self, event: ProgressEvent) -> Transition {
        if self.phase != Phase::Streaming {
            tracing::debug!(session = %self.id, kind = event.kind(), phase = ?self.phase, "Ignoring frame after run ended");
            return Transition::Unchanged;
        }

        match event {
            ProgressEvent::Progress {
                progress,
                message,
                stage,
            } => {
                self.view.set_progress(progress, &message);
                self.view.nodes.activate(Node::for_stage(&stage));
                let line = format!("{} ({}%)", message, progress);
                self.view.log(LogLevel::Info, line);
                Transition::Updated
            }
            ProgressEvent::NodeUpdate { event } => {
                for name in event.keys() {
                    self.view.log(LogLevel::Debug, format!("Node {} updated", name));
                }
                Transition::Updated
            }
            ProgressEvent::Completion { final_state, .. } => {
                self.view.set_progress(100, COMPLETE_STATUS);
                self.view
                    .log(LogLevel::Success, "Analysis complete, loading results...");
                if let Some(state) = final_state {
                    self.view.report = Some(ReportTabs::from_final_state(&state));
                    self.view.final_state = Some(state);
                }
                self.view.nodes.finish_all();
                self.view.submit = SubmitControl {
                    enabled: false,
                    label: COMPLETE_STATUS,
                };
                self.phase = Phase::Completed;
                tracing::info!(session = %self.id, has_report = self.view.report.is_some(), "Analysis complete");
                Transition::Completed
            }
            ProgressEvent::Error { message } => {
                self.view.log(LogLevel::Error, format!("Error: {}", message));
                tracing::warn!(session = %self.id, error = %message, "Backend reported task failure");
                self.fail(message);
                Transition::Failed
            }
        }
    }

    /// Show a result tab. Nothing is re-rendered.
    pub fn switch_tab(&mut self, tab: ReportTab) {
        self.view.active_tab = tab;
    }

    /// Forget the previous run but keep the session identity.
    fn reset_run(&mut self) {
        self.phase = Phase::Idle;
        self.file = None;
        self.task_id = None;
        self.uploaded_as = None;
        self.view = ViewState::default();
    }
}
