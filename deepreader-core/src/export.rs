//! Report bundle export.
//!
//! A finished run is written to `<dir>/<YYYYmmdd_HHMMSS>_<stem>/`:
//!
//! | File | Content |
//! |------|---------|
//! | `final_state.json` | the payload as received, pretty-printed |
//! | `<tab>.md` | formatted Markdown, one per present section |
//! | `<tab>.html` | the same section rendered to HTML |

use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;

use crate::config::RenderConfig;
use crate::error::Result;
use crate::markdown::{html_document, render_html};
use crate::report::ReportTabs;

/// Files written for one bundle.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Write a bundle under `base_dir` named after `stem` and the current time.
pub fn write_bundle(
    base_dir: &Path,
    stem: &str,
    final_state: &Value,
    tabs: &ReportTabs,
    render: &RenderConfig,
) -> Result<ExportSummary> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let dir = base_dir.join(format!("{}_{}", timestamp, sanitize_stem(stem)));
    write_bundle_to(&dir, final_state, tabs, render)
}

/// Write a bundle into exactly `dir`, creating it if needed.
pub fn write_bundle_to(
    dir: &Path,
    final_state: &Value,
    tabs: &ReportTabs,
    render: &RenderConfig,
) -> Result<ExportSummary> {
    std::fs::create_dir_all(dir)?;
    let mut files = Vec::new();

    let state_path = dir.join("final_state.json");
    std::fs::write(&state_path, serde_json::to_string_pretty(final_state)?)?;
    files.push(state_path);

    for (tab, markdown) in tabs.present() {
        let md_path = dir.join(format!("{}.md", tab.file_stem()));
        std::fs::write(&md_path, markdown)?;
        files.push(md_path);

        let html_path = dir.join(format!("{}.html", tab.file_stem()));
        let html = html_document(tab.title(), &render_html(markdown, render));
        std::fs::write(&html_path, html)?;
        files.push(html_path);
    }

    tracing::info!(dir = %dir.display(), files = files.len(), "Report bundle written");

    Ok(ExportSummary {
        dir: dir.to_path_buf(),
        files,
    })
}

/// Keep bundle directory names portable.
fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    if cleaned.is_empty() {
        "report".to_string()
    } else {
        cleaned
    }
}
