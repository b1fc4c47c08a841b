//! Interactive TUI for diskerase.
//!
//! Lists attached disks and walks the user through selection, confirmation
//! and the erase itself. All workflow decisions are made by the controller;
//! the TUI renders its snapshots and forwards key presses as intents.

mod app;
mod input;
mod ui;

use std::io::{self, stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::context::AppContext;
use app::TuiApp;

/// How often the screen is redrawn when no key is pressed.
const TICK: Duration = Duration::from_millis(100);

/// Run the TUI until the user quits.
pub async fn run(ctx: AppContext) -> Result<()> {
    let (handle, controller) = ctx.start_controller();

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let simulation = ctx.config.simulation || !cfg!(target_os = "linux");
    let mut app = TuiApp::new(handle, simulation);
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    // Dropping the app releases the last handle and lets the controller stop.
    drop(app);
    if let Err(e) = controller.await {
        warn!(error = %e, "Controller task ended abnormally");
    }
    info!("TUI closed");

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
) -> Result<()> {
    loop {
        app.sync();
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(TICK)? {
            let event = event::read()?;
            if let Some(action) = input::handle_event(event) {
                app.handle_action(action).await;
            }
        }

        if !app.running {
            break;
        }
    }

    Ok(())
}
