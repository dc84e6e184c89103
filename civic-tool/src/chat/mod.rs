mod app;
mod input;
mod ui;

use std::io;
use std::time::Duration;

use civic_session::LaunchKind;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use crate::context::AppContext;
use app::ChatApp;
use crate::error::CivError;

enum Exit {
    Quit,
    Reset,
}

pub async fn run(
    ctx: AppContext,
    conversation: Option<String>,
    launch: LaunchKind,
) -> Result<(), CivError> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut kind = launch;
    let mut open = conversation;
    let result = loop {
        let mut app = ChatApp::start(&ctx, kind, open.take()).await;
        match run_loop(&mut terminal, &mut app).await {
            Ok(Exit::Quit) => break Ok(()),
            // The session is gone; relaunch as if the page were reloaded.
            Ok(Exit::Reset) => kind = LaunchKind::Reload,
            Err(e) => break Err(e),
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut ChatApp,
) -> Result<Exit, CivError> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        // Poll for events with timeout to allow checking async results
        if event::poll(Duration::from_millis(50))? {
            let event = event::read()?;
            input::handle_event(app, event);
        }

        app.poll_pending();

        if app.reset_requested() {
            return Ok(Exit::Reset);
        }
        if app.should_quit {
            return Ok(Exit::Quit);
        }
    }
}
