// src/ui/input.rs

//! Keyboard and resize handling for the viewer.

use crate::models::{Event, UserInput, ViewCommand};
use crate::system::multiplexer::InputHandle;
use crossterm::event::{self, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io;
use std::thread::{self, JoinHandle};

/// Lines moved by PageUp/PageDown.
pub const PAGE_LINES: u16 = 20;

/// Maps one terminal event to a session-loop event, if it means anything.
pub fn translate(terminal_event: event::Event) -> Option<Event> {
    match terminal_event {
        event::Event::Key(key) => translate_key(key),
        event::Event::Resize(_, _) => Some(ViewCommand::Redraw.into()),
        _ => None,
    }
}

fn translate_key(key: KeyEvent) -> Option<Event> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserInput::Quit.into());
    }

    let event = match key.code {
        KeyCode::Tab | KeyCode::Right => UserInput::NextView.into(),
        KeyCode::BackTab | KeyCode::Left => UserInput::PreviousView.into(),
        KeyCode::Char('q') | KeyCode::Esc => UserInput::Quit.into(),
        KeyCode::Up | KeyCode::Char('k') => ViewCommand::ScrollUp(1).into(),
        KeyCode::Down | KeyCode::Char('j') => ViewCommand::ScrollDown(1).into(),
        KeyCode::PageUp => ViewCommand::ScrollUp(PAGE_LINES).into(),
        KeyCode::PageDown => ViewCommand::ScrollDown(PAGE_LINES).into(),
        KeyCode::Home | KeyCode::Char('g') => ViewCommand::Top.into(),
        KeyCode::End | KeyCode::Char('G') => ViewCommand::Bottom.into(),
        _ => return None,
    };
    Some(event)
}

/// Reads terminal events on a background thread and forwards them.
///
/// The thread ends when the session loop is gone or the terminal read fails.
/// It is never joined: at quit it is usually blocked in a read.
pub fn spawn_reader(handle: InputHandle) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("loupe-input".to_string())
        .spawn(move || {
            loop {
                let terminal_event = match event::read() {
                    Ok(terminal_event) => terminal_event,
                    Err(e) => {
                        log::warn!("Terminal input failed: {}", e);
                        return;
                    }
                };
                if let Some(event) = translate(terminal_event) {
                    if handle.send(event).is_err() {
                        return;
                    }
                }
            }
        })
}
