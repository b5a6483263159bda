//! HTTP client for the DeepReader analysis backend
//!
//! Two sequential calls set up a run:
//!
//! 1. `POST /api/upload` with the document as multipart field `file`,
//!    answered with `{"filename": ...}`
//! 2. `POST /api/start_research` with multipart text fields `filename`,
//!    `user_core_question` and `research_role`, answered with
//!    `{"task_id": ...}`
//!
//! Failures answer non-2xx with `{"detail": ...}`. Progress for the task is
//! then read from `ws(s)://<host>/ws/<task_id>` (see [`crate::channel`]).

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::{SelectedFile, Submission, TaskId};

const UPLOAD_FAILED: &str = "File upload failed";
const START_FAILED: &str = "Failed to start the research task";

/// Response from POST /api/upload
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    /// Name the backend stored the document under
    pub filename: String,
}

/// Response from POST /api/start_research
#[derive(Debug, Deserialize)]
pub struct StartResponse {
    pub task_id: TaskId,
}

/// Error body for non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// HTTP client for the analysis backend
#[derive(Debug, Clone)]
pub struct ResearchClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ResearchClient {
    /// Create a client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim().trim_end_matches('/').to_string();

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload a document, returning the name the backend stored it under.
    pub async fn upload(&self, file: &SelectedFile) -> Result<String> {
        let url = format!("{}/api/upload", self.base_url);

        let bytes = tokio::fs::read(&file.path).await?;
        tracing::debug!(file = %file.name, bytes = bytes.len(), "Uploading document");

        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(file.mime)
            .map_err(|e| Error::InvalidResponse(format!("invalid MIME type: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let body: UploadResponse = read_json(response, UPLOAD_FAILED).await?;
        Ok(body.filename)
    }

    /// Start the analysis task for an uploaded document.
    pub async fn start_research(
        &self,
        filename: &str,
        question: &str,
        role: &str,
    ) -> Result<TaskId> {
        let url = format!("{}/api/start_research", self.base_url);

        let form = Form::new()
            .text("filename", filename.to_string())
            .text("user_core_question", question.to_string())
            .text("research_role", role.to_string());

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let body: StartResponse = read_json(response, START_FAILED).await?;
        Ok(body.task_id)
    }

    /// Upload then start. The start request is only sent after the upload
    /// succeeded, since it needs the stored filename.
    pub async fn launch(&self, submission: &Submission) -> Result<(String, TaskId)> {
        let filename = self.upload(&submission.file).await?;
        let task_id = self
            .start_research(&filename, &submission.question, &submission.role)
            .await?;
        Ok((filename, task_id))
    }

    /// Progress channel URL for a task: `wss` iff the backend is `https`.
    pub fn channel_url(&self, task_id: &TaskId) -> String {
        let (scheme, rest) = match self.base_url.split_once("://") {
            Some(("https", rest)) => ("wss", rest),
            Some((_, rest)) => ("ws", rest),
            None => ("ws", self.base_url.as_str()),
        };
        format!(
            "{}://{}/ws/{}",
            scheme,
            rest,
            urlencoding::encode(task_id.as_str())
        )
    }
}

/// Decode a success body, or turn a non-2xx answer into [`Error::Api`].
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    fallback: &str,
) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        return serde_json::from_str(&text).map_err(|e| Error::InvalidResponse(e.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        detail: error_detail(&text).unwrap_or_else(|| fallback.to_string()),
    })
}

/// Extract `detail` from an error body. Non-string details (such as
/// validation error lists) are returned as JSON text.
fn error_detail(body: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(body).ok()?;
    match body.detail? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
