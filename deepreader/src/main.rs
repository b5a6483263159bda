//! deepreader - DeepReader document analysis client
//!
//! Terminal UI for uploading a document, asking a question about it and
//! following the analysis until the report is ready.

mod app;
mod ui;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use deepreader_core::{Config, ResearchClient};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::App;

#[derive(Parser)]
#[command(name = "deepreader")]
#[command(about = "Analyze a document with the DeepReader service")]
#[command(version)]
struct Args {
    /// Backend base URL (overrides server.base_url)
    #[arg(long)]
    server: Option<String>,

    /// Document to pre-fill (.pdf, .epub or .md)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Question to pre-fill
    #[arg(long)]
    question: Option<String>,

    /// Role preset to pre-select; anything else becomes a custom role
    #[arg(long)]
    role: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(server) = args.server {
        config.server.base_url = server;
    }

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        deepreader_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(server = %config.server.base_url, "deepreader TUI starting up");

    let client = ResearchClient::new(&config.server).context("invalid server configuration")?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    let mut app = App::new(config, client, runtime.handle().clone());
    if let Some(file) = args.file {
        app.prefill_file(&file);
    }
    if let Some(question) = args.question {
        app.prefill_question(&question);
    }
    if let Some(role) = args.role {
        app.prefill_role(&role);
    }

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    // Close the progress channel before the runtime goes away.
    drop(app);
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));

    tracing::info!("deepreader TUI shutting down");

    result
}

/// Run the main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Apply everything the network tasks reported since the last tick
        app.drain_events();

        // Render
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    Ok(())
}
