//! deepreader-run - headless DeepReader client
//!
//! Uploads one document, starts the analysis and follows its progress on
//! the terminal. The finished report is written as a bundle of Markdown and
//! HTML files next to the raw `final_state.json`.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Reports: $XDG_DATA_HOME/deepreader/reports (~/.local/share/deepreader/reports)
//! - Logs: $XDG_STATE_HOME/deepreader/deepreader.log (~/.local/state/deepreader/deepreader.log)
//! - Config: $XDG_CONFIG_HOME/deepreader/config.toml (~/.config/deepreader/config.toml)

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use deepreader_core::config::CUSTOM_ROLE;
use deepreader_core::format::{format_bytes_opt, format_elapsed};
use deepreader_core::session::{LogEntry, LogLevel};
use deepreader_core::{
    channel, export, Config, Phase, ResearchClient, ResearchForm, SelectedFile, Session,
    Transition,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "deepreader-run")]
#[command(about = "Analyze a document with the DeepReader service, without the TUI")]
#[command(version)]
struct Args {
    /// Document to analyze (.pdf, .epub or .md)
    #[arg(long)]
    file: PathBuf,

    /// Core research question
    #[arg(long)]
    question: String,

    /// Research role preset (defaults to form.default_role)
    #[arg(long, conflicts_with = "custom_role")]
    role: Option<String>,

    /// Free-text research role
    #[arg(long)]
    custom_role: Option<String>,

    /// Backend base URL (overrides server.base_url)
    #[arg(long)]
    server: Option<String>,

    /// Directory for the report bundle (overrides output.dir)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Do not write the report bundle
    #[arg(long)]
    no_save: bool,

    /// Print node updates and channel diagnostics
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn form(&self, config: &Config) -> ResearchForm {
        let (role_preset, custom_role) = match (&self.role, &self.custom_role) {
            (_, Some(custom)) => (CUSTOM_ROLE.to_string(), custom.clone()),
            (Some(role), None) => (role.clone(), String::new()),
            (None, None) => (config.form.default_role.clone(), String::new()),
        };
        ResearchForm {
            question: self.question.clone(),
            role_preset,
            custom_role,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(server) = &args.server {
        config.server.base_url = server.clone();
    }
    if let Some(out) = &args.out {
        config.output.dir = Some(out.clone());
    }
    if args.no_save {
        config.output.save_reports = false;
    }

    // Initialize logging
    let _log_guard =
        deepreader_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(server = %config.server.base_url, "deepreader-run starting");

    // Validate everything before touching the network
    let mut session = Session::new();
    let file = SelectedFile::from_disk(&args.file)
        .with_context(|| format!("cannot use {}", args.file.display()))?;
    session.select_file(file)?;
    let submission = session.submit(&args.form(&config))?;
    let client = ResearchClient::new(&config.server).context("invalid server configuration")?;

    println!(
        "Document: {} ({})",
        submission.file.name,
        format_bytes_opt(submission.file.size)
    );
    println!("Role: {}", submission.role);
    println!("Server: {}", client.base_url());

    let started = Instant::now();

    let filename = match client.upload(&submission.file).await {
        Ok(filename) => filename,
        Err(e) => {
            session.request_failed(&e);
            return Err(e).context("upload failed");
        }
    };
    session.upload_succeeded(&filename);

    let task_id = match client
        .start_research(&filename, &submission.question, &submission.role)
        .await
    {
        Ok(task_id) => task_id,
        Err(e) => {
            session.request_failed(&e);
            return Err(e).context("failed to start analysis");
        }
    };
    session.start_succeeded(task_id.clone());

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
            .context("invalid progress bar template")?
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = channel::spawn(
        client.channel_url(&task_id),
        task_id,
        config.server.channel_idle_timeout(),
        tx,
    );

    let mut printed = session.view.log.len();
    print_entries(&pb, &session.view.log, args.verbose);

    while let Some(message) = rx.recv().await {
        let transition = session.handle(&message.task_id, message.event);

        let log = &session.view.log;
        print_entries(&pb, &log[printed..], args.verbose);
        printed = log.len();

        pb.set_position(u64::from(session.view.percent));
        pb.set_message(session.view.status.clone());

        match transition {
            Transition::Completed | Transition::Failed => break,
            Transition::Updated | Transition::Unchanged => {}
        }
    }
    handle.close();
    pb.finish_and_clear();

    match session.phase() {
        Phase::Completed => {}
        Phase::Failed => {
            let alert = session.view.alert.clone().unwrap_or_default();
            bail!("analysis failed: {}", alert);
        }
        phase => {
            tracing::warn!(?phase, "Progress channel closed before the analysis finished");
            bail!("progress channel closed before the analysis finished");
        }
    }

    println!(
        "Analysis complete in {}",
        format_elapsed(started.elapsed())
    );

    let view = &session.view;
    let (Some(final_state), Some(report)) = (&view.final_state, &view.report) else {
        println!("The backend returned no report.");
        return Ok(());
    };

    for (tab, _) in report.present() {
        println!("  - {}", tab.title());
    }

    if config.output.save_reports {
        let summary = export::write_bundle(
            &config.output.reports_dir(),
            &submission.file.stem(),
            final_state,
            report,
            &config.render,
        )
        .context("failed to write report bundle")?;
        println!("Report saved to {}", summary.dir.display());
    }

    tracing::info!("deepreader-run complete");
    Ok(())
}

/// Print log lines above the progress bar. Debug lines only with -v.
fn print_entries(pb: &ProgressBar, entries: &[LogEntry], verbose: bool) {
    for entry in entries {
        if entry.level == LogLevel::Debug && !verbose {
            continue;
        }
        pb.println(entry.display());
    }
}
