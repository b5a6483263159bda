//! Core domain types for deepreader
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One client run: file selection, submission, progress, results |
//! | **Task** | An analysis run on the backend, identified by a [`TaskId`] |
//! | **Stage** | Backend phase name carried on `progress` events |
//! | **Node** | One of the three progress indicators a stage lights up |
//! | **Final state** | The structured report payload delivered on completion |

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;

// ============================================
// Documents
// ============================================

/// Extensions the backend can ingest. The check is case-insensitive.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "epub", "md"];

/// A document chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Location on disk
    pub path: PathBuf,
    /// Display name sent as the multipart filename
    pub name: String,
    /// Advisory MIME type derived from the extension
    pub mime: &'static str,
    /// Size in bytes, when known
    pub size: Option<u64>,
}

impl SelectedFile {
    /// Build a selection from a path, rejecting unsupported extensions.
    ///
    /// Does not touch the filesystem; see [`SelectedFile::from_disk`].
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ValidationError> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_for(&name)?;
        Ok(Self {
            path,
            name,
            mime,
            size: None,
        })
    }

    /// Build a selection and record the file size from disk metadata.
    pub fn from_disk(path: impl Into<PathBuf>) -> crate::error::Result<Self> {
        let mut file = Self::new(path)?;
        file.size = Some(std::fs::metadata(&file.path)?.len());
        Ok(file)
    }

    /// File name without its extension (used to name report bundles).
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Lowercased text after the last `.`, or the whole name when there is none.
fn extension_of(name: &str) -> String {
    name.rsplit('.').next().unwrap_or_default().to_lowercase()
}

/// Map a file name to its advisory MIME type, rejecting unknown extensions.
fn mime_for(name: &str) -> Result<&'static str, ValidationError> {
    let ext = extension_of(name);
    if !name.contains('.') {
        return Err(ValidationError::UnsupportedFileType(name.to_string()));
    }
    match ext.as_str() {
        "pdf" => Ok("application/pdf"),
        "epub" => Ok("application/epub+zip"),
        "md" => Ok("text/markdown"),
        _ => Err(ValidationError::UnsupportedFileType(format!(".{}", ext))),
    }
}

// ============================================
// Tasks
// ============================================

/// Opaque identifier the backend assigns to an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// Validated input for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub file: SelectedFile,
    pub question: String,
    pub role: String,
}

// ============================================
// Progress
// ============================================

/// The three progress indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Preparation,
    Reading,
    ReportGeneration,
}

impl Node {
    pub const ALL: [Node; 3] = [Node::Preparation, Node::Reading, Node::ReportGeneration];

    /// Node lit by a backend stage name. Unknown stages light nothing.
    pub fn for_stage(stage: &str) -> Option<Node> {
        match stage {
            "rag_preparation" | "rag_parsing" => Some(Node::Preparation),
            "reading" => Some(Node::Reading),
            "report_generation" => Some(Node::ReportGeneration),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Node::Preparation => "Document preparation",
            Node::Reading => "Iterative reading",
            Node::ReportGeneration => "Report generation",
        }
    }

    fn index(self) -> usize {
        match self {
            Node::Preparation => 0,
            Node::Reading => 1,
            Node::ReportGeneration => 2,
        }
    }
}

/// Indicator state of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeStatus {
    #[default]
    Inactive,
    Active,
    Done,
}

/// Indicator states for all three nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeBoard([NodeStatus; 3]);

impl NodeBoard {
    pub fn get(&self, node: Node) -> NodeStatus {
        self.0[node.index()]
    }

    /// Reset every node, then mark `active` (if any) as active.
    pub fn activate(&mut self, active: Option<Node>) {
        self.0 = [NodeStatus::Inactive; 3];
        if let Some(node) = active {
            self.0[node.index()] = NodeStatus::Active;
        }
    }

    pub fn finish_all(&mut self) {
        self.0 = [NodeStatus::Done; 3];
    }

    /// Node currently marked active.
    pub fn active(&self) -> Option<Node> {
        Node::ALL
            .into_iter()
            .find(|n| self.get(*n) == NodeStatus::Active)
    }
}

/// A message received on the progress channel.
///
/// Any other `type` fails to deserialize and is handled as a malformed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        #[serde(default, deserialize_with = "null_as_default")]
        progress: i64,
        #[serde(default, deserialize_with = "null_as_default")]
        message: String,
        #[serde(default, deserialize_with = "null_as_default")]
        stage: String,
    },
    NodeUpdate {
        #[serde(default, deserialize_with = "null_as_default")]
        event: Map<String, Value>,
    },
    Completion {
        #[serde(default)]
        final_state: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_dir: Option<String>,
    },
    Error {
        #[serde(default, deserialize_with = "null_as_default")]
        message: String,
    },
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ProgressEvent {
    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::NodeUpdate { .. } => "node_update",
            ProgressEvent::Completion { .. } => "completion",
            ProgressEvent::Error { .. } => "error",
        }
    }
}

// ============================================
// Report
// ============================================

/// One section of the draft report tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DraftSection {
    pub title: Option<String>,
    pub content_brief: Option<String>,
    pub written_content: Vec<String>,
    pub children: Vec<DraftSection>,
}

impl DraftSection {
    /// Read a section leniently: wrong-typed fields are treated as absent.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| truthy_text(value, key);
        let written_content = value
            .get("written_content")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(display_value).collect())
            .unwrap_or_default();
        let children = value
            .get("children")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(DraftSection::from_value).collect())
            .unwrap_or_default();

        Self {
            title: text("title"),
            content_brief: text("content_brief"),
            written_content,
            children,
        }
    }
}

/// One question/answer pair from a debate round.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DebateItem {
    pub question: Option<String>,
    pub answer: Option<String>,
}

impl DebateItem {
    fn from_value(value: &Value) -> Self {
        Self {
            question: truthy_text(value, "question"),
            answer: truthy_text(value, "content_retrieve_answer"),
        }
    }
}

/// A report section as delivered: absent, present but malformed, or usable.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Field<T> {
    #[default]
    Absent,
    Malformed,
    Present(T),
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }
}

/// Typed view of a `final_state` payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    pub draft_report: Field<Vec<DraftSection>>,
    pub chapter_summaries: Field<Vec<(String, String)>>,
    pub thematic_analysis: Field<Vec<(String, String)>>,
    /// `None` marks a round that was not a list
    pub raw_reviewer_outputs: Field<Vec<Option<Vec<DebateItem>>>>,
}

impl Report {
    /// Read a report leniently. Never fails; unusable sections become
    /// [`Field::Malformed`].
    pub fn from_value(final_state: &Value) -> Self {
        Self {
            draft_report: field(final_state, "draft_report", |v| {
                v.as_array()
                    .map(|items| items.iter().map(DraftSection::from_value).collect())
            }),
            chapter_summaries: field(final_state, "chapter_summaries", text_pairs),
            thematic_analysis: field(final_state, "thematic_analysis", text_pairs),
            raw_reviewer_outputs: field(final_state, "raw_reviewer_outputs", |v| {
                v.as_array().map(|rounds| {
                    rounds
                        .iter()
                        .map(|round| {
                            round
                                .as_array()
                                .map(|items| items.iter().map(DebateItem::from_value).collect())
                        })
                        .collect()
                })
            }),
        }
    }
}

/// Absent and falsy values (`null`, `false`, `0`, `""`) leave a section
/// absent; anything else is parsed or marked malformed.
fn field<T>(state: &Value, key: &str, parse: impl Fn(&Value) -> Option<T>) -> Field<T> {
    match state.get(key) {
        None => Field::Absent,
        Some(v) if is_falsy(v) => Field::Absent,
        Some(v) => parse(v).map(Field::Present).unwrap_or(Field::Malformed),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Text of `key` unless it is missing or falsy.
fn truthy_text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .filter(|v| !is_falsy(v))
        .map(display_value)
}

fn text_pairs(value: &Value) -> Option<Vec<(String, String)>> {
    value.as_object().map(|map| {
        map.iter()
            .map(|(k, v)| (k.clone(), display_value(v)))
            .collect()
    })
}

/// Render a JSON value as report text: strings verbatim, anything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
