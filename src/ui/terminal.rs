// src/ui/terminal.rs

//! Raw mode and alternate screen handling.

use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use ratatui::prelude::CrosstermBackend;
use std::io::{self, Stdout};

/// The terminal type the viewer draws on.
pub type Term = Terminal<CrosstermBackend<Stdout>>;

/// Enters raw mode and the alternate screen.
///
/// Pair every successful call with [`restore`]; the binary does this with a
/// scope guard so the terminal is restored on every exit path.
pub fn enter() -> io::Result<Term> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = terminal::disable_raw_mode();
        return Err(e);
    }
    Terminal::new(CrosstermBackend::new(stdout))
}

/// Leaves the alternate screen and raw mode. Errors are logged, not returned.
pub fn restore() {
    if let Err(e) = terminal::disable_raw_mode() {
        log::warn!("Failed to disable raw mode: {}", e);
    }
    if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show) {
        log::warn!("Failed to leave the alternate screen: {}", e);
    }
}
