//! # deepreader-core
//!
//! Core library for deepreader - a client for the DeepReader document
//! analysis service.
//!
//! This library provides:
//! - Domain types for documents, progress events and reports
//! - The session state machine behind every UI
//! - HTTP client and WebSocket progress channel for the backend
//! - Markdown formatting, HTML rendering and export of the final report
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Flow
//!
//! A run goes upload -> start -> stream -> complete. The [`Session`] holds
//! all state and is only mutated by its owner; [`ResearchClient`] and
//! [`channel`] report results back as values.
//!
//! ## Example
//!
//! ```rust,no_run
//! use deepreader_core::{Config, ResearchClient, ResearchForm, Session};
//!
//! # async fn run() -> deepreader_core::Result<()> {
//! let config = Config::load()?;
//! let client = ResearchClient::new(&config.server)?;
//!
//! let mut session = Session::new();
//! session.select_path("paper.pdf")?;
//! let submission = session.submit(&ResearchForm {
//!     question: "What is the core argument?".to_string(),
//!     role_preset: "Academic Researcher".to_string(),
//!     custom_role: String::new(),
//! })?;
//! let (filename, task_id) = client.launch(&submission).await?;
//! session.upload_succeeded(&filename);
//! session.start_succeeded(task_id.clone());
//! println!("progress at {}", client.channel_url(&task_id));
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use channel::{ChannelEvent, ChannelHandle, ChannelMessage};
pub use client::ResearchClient;
pub use config::Config;
pub use error::{Error, Result, ValidationError};
pub use report::{ReportTab, ReportTabs};
pub use session::{Phase, ResearchForm, Session, Transition};
pub use types::*;

// Public modules
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod markdown;
pub mod report;
pub mod session;
pub mod types;
