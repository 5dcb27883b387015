//! livedash: a terminal dashboard of live Elasticsearch hit counts.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌────────────────────┐ (index, DisplayState) ┌──────────┐  draw()  ┌──────────┐
//! │ PollingController  │ ────────────────────► │  app.rs  │ ───────► │  ui.rs   │
//! │ (one per widget)   │      (channel)        │ (state)  │          │ (render) │
//! └────────────────────┘                       └──────────┘          └──────────┘
//!                                                   ▲
//!                                                   │ handle_key_event()
//!                                              ┌──────────┐
//!                                              │ input.rs │
//!                                              └──────────┘
//! ```
//!
//! * **`livedash` (lib)**: widget validation, data sources and the polling
//!   controller.
//! * **`app`**: owns all terminal state (widget views, selection).
//! * **`ui`**: pure rendering: reads `App` state and draws widgets.
//! * **`input`**: maps key events to `App` mutations.
//! * **`main`**: wires everything together: parse args, set up logging and
//!   the terminal, start the controllers and run the event loop.

mod app;
mod input;
mod ui;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use livedash::{
    config, DashboardConfig, DisplayState, HitCountSource, HttpTransport, PollingController,
};

use app::App;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Dashboard file listing the widgets to show.
    #[arg(short, long, default_value = "dashboard.json")]
    config: PathBuf,

    /// Where to write logs (the terminal is taken by the UI).
    #[arg(long, default_value = "livedash.log")]
    log_file: PathBuf,
}

// ---------------------------------------------------------------------------
// RAII terminal guard, restores the terminal even on panic
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before printing a panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    // -- load the dashboard --------------------------------------------------
    let dashboard = DashboardConfig::load(&cli.config)
        .with_context(|| format!("cannot load dashboard {}", cli.config.display()))?;
    if dashboard.widgets.is_empty() {
        bail!("no widgets declared in {}", cli.config.display());
    }
    info!(
        widgets = dashboard.widgets.len(),
        credentials = dashboard.credentials.len(),
        "dashboard loaded"
    );

    // -- start one controller per widget -------------------------------------
    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;
    let enter = runtime.enter();

    let transport = HttpTransport::new(dashboard.request_timeout())
        .context("cannot build HTTP client")?;
    let source = HitCountSource::new(transport, dashboard.credential_store());
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, DisplayState)>();

    let mut controllers = Vec::with_capacity(dashboard.widgets.len());
    for (index, declaration) in dashboard.widgets.iter().enumerate() {
        let tx = tx.clone();
        let controller = PollingController::new(declaration.clone(), source.clone(), move |state| {
            // The receiver only goes away when the UI is shutting down.
            let _ = tx.send((index, state));
        });
        controller.start()?;
        controllers.push(controller);
    }

    let mut app = App::new(
        dashboard
            .widgets
            .iter()
            .map(|declaration| config::declared_title(declaration).to_owned()),
    );
    app.select_first();

    // -- terminal setup (RAII, Drop restores on exit or panic) ---------------
    install_panic_hook();
    let mut guard = TerminalGuard::new()?;

    // -- main event loop -----------------------------------------------------
    // Runs at ~10 fps (100 ms tick).  Each iteration:
    //   1. Drain any updates from the controllers.
    //   2. Render the UI.
    //   3. Poll for keyboard input (non-blocking, up to tick_rate).
    let tick_rate = Duration::from_millis(100);

    loop {
        let mut received = 0;
        while let Ok((index, state)) = rx.try_recv() {
            if app.apply(index, state) {
                received += 1;
            }
        }
        if received > 0 {
            app.status = format!("Updated {}", chrono::Local::now().format("%H:%M:%S"));
        }

        guard.terminal.draw(|f| ui::draw(&app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        if app.quit {
            break;
        }
    }

    for controller in &controllers {
        controller.stop();
    }
    drop(guard);
    drop(enter);
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("shut down");
    Ok(())
}
