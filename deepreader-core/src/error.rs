//! Error types for deepreader-core

use thiserror::Error;

/// Main error type for the deepreader-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Form input rejected before any network call
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend answered with a non-2xx status
    #[error("{detail}")]
    Api { status: u16, detail: String },

    /// Transport-level failure (connection refused, timeout, ...)
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered 2xx but the body is unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Progress channel failure
    #[error("progress channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Client-side validation failures.
///
/// These never leave the process and never change session state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please choose a document to analyze.")]
    NoFile,

    #[error("Unsupported file type '{0}'. Please upload a PDF, EPUB or Markdown file.")]
    UnsupportedFileType(String),

    #[error("Please enter a core research question.")]
    EmptyQuestion,

    #[error("Please enter a research role.")]
    EmptyRole,

    #[error("An analysis is already running.")]
    Busy,

    #[error("This analysis has finished. Select a document to start a new one.")]
    Finished,
}

/// Result type alias for deepreader-core
pub type Result<T> = std::result::Result<T, Error>;
