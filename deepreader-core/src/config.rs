//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/deepreader/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/deepreader/` (~/.config/deepreader/)
//! - Data: `$XDG_DATA_HOME/deepreader/` (~/.local/share/deepreader/)
//! - State/Logs: `$XDG_STATE_HOME/deepreader/` (~/.local/state/deepreader/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Role preset that switches the form to free-text input.
pub const CUSTOM_ROLE: &str = "Custom";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Analysis backend
    #[serde(default)]
    pub server: ServerConfig,

    /// Research form presets
    #[serde(default)]
    pub form: FormConfig,

    /// Markdown/HTML rendering
    #[serde(default)]
    pub render: RenderConfig,

    /// Report export
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Analysis backend configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Base URL of the backend (e.g., `http://localhost:8000`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Seconds without a progress frame before the run is considered
    /// stalled. 0 waits forever.
    #[serde(default)]
    pub channel_idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            channel_idle_timeout_secs: 0,
        }
    }
}

impl ServerConfig {
    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Channel idle timeout, if enabled
    pub fn channel_idle_timeout(&self) -> Option<Duration> {
        match self.channel_idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server.base_url must start with http:// or https:// (got {:?})",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "server.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

/// Research form configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FormConfig {
    /// Role presets offered by the form. `Custom` is always appended.
    #[serde(default = "default_role_presets")]
    pub role_presets: Vec<String>,

    /// Preset selected when the form opens
    #[serde(default = "default_role")]
    pub default_role: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            role_presets: default_role_presets(),
            default_role: default_role(),
        }
    }
}

impl FormConfig {
    /// Presets in display order, always ending with [`CUSTOM_ROLE`].
    pub fn presets(&self) -> Vec<String> {
        let mut presets: Vec<String> = self
            .role_presets
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty() && p != CUSTOM_ROLE)
            .collect();
        presets.push(CUSTOM_ROLE.to_string());
        presets
    }

    /// Index of the default preset within [`FormConfig::presets`].
    pub fn default_index(&self) -> usize {
        self.presets()
            .iter()
            .position(|p| p == &self.default_role)
            .unwrap_or(0)
    }
}

fn default_role_presets() -> Vec<String> {
    [
        "Senior Industry Analyst",
        "Academic Researcher",
        "Investment Analyst",
        "Product Manager",
        "Policy Advisor",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_role() -> String {
    "Senior Industry Analyst".to_string()
}

/// Markdown rendering configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// Pass raw HTML from report Markdown through to the HTML output.
    /// Off by default: report text is escaped.
    #[serde(default)]
    pub allow_raw_html: bool,

    /// Syntax-highlight fenced code blocks in HTML output
    #[serde(default = "default_true")]
    pub highlight_code: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            allow_raw_html: false,
            highlight_code: true,
        }
    }
}

/// Report export configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Write the report bundle when an analysis completes
    #[serde(default = "default_true")]
    pub save_reports: bool,

    /// Directory for report bundles (defaults to the data dir)
    pub dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_reports: true,
            dir: None,
        }
    }
}

impl OutputConfig {
    /// Resolved directory for report bundles
    pub fn reports_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(Config::reports_dir)
    }
}

fn default_true() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.server.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/deepreader/config.toml` (~/.config/deepreader/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("deepreader").join("config.toml")
    }

    /// Returns the data directory path
    ///
    /// `$XDG_DATA_HOME/deepreader/` (~/.local/share/deepreader/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("deepreader")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/deepreader/` (~/.local/state/deepreader/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("deepreader")
    }

    /// Returns the default report bundle directory
    ///
    /// `$XDG_DATA_HOME/deepreader/reports/`
    pub fn reports_dir() -> PathBuf {
        Self::data_dir().join("reports")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/deepreader/deepreader.log` (~/.local/state/deepreader/deepreader.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("deepreader.log")
    }
}
