// src/core/session_loop.rs

//! The single-threaded loop that reduces events and redraws.

use crate::{
    constants::MAX_EVENTS_PER_FRAME,
    core::session::Session,
    models::{Event, ViewCommand},
    system::multiplexer::EventFeed,
};
use anyhow::Result;

/// Whatever shows the session to the user.
pub trait Frontend {
    /// Draws the current state.
    fn draw(&mut self, session: &Session) -> Result<()>;

    /// Applies a presentation-only command such as scrolling.
    fn apply(&mut self, command: ViewCommand, session: &Session);
}

/// Runs the reduce/draw loop until the user quits or every source is gone.
///
/// Events are reduced one at a time on this thread. After each blocking
/// wait, whatever else is ready right now is reduced too (bounded), and the
/// frontend draws once for the whole burst.
pub fn run(feed: &EventFeed, mut session: Session, frontend: &mut impl Frontend) -> Result<Session> {
    frontend.draw(&session)?;

    while let Some(event) = feed.next() {
        session = dispatch(session, event, frontend);

        let mut budget = MAX_EVENTS_PER_FRAME;
        while budget > 0 && !session.is_finished() {
            let Some(event) = feed.try_next() else {
                break;
            };
            session = dispatch(session, event, frontend);
            budget -= 1;
        }

        if session.is_finished() {
            log::debug!("Quit requested, leaving the session loop.");
            break;
        }
        frontend.draw(&session)?;
    }

    Ok(session)
}

fn dispatch(session: Session, event: Event, frontend: &mut impl Frontend) -> Session {
    match event {
        Event::View(command) => {
            frontend.apply(command, &session);
            session
        }
        other => session.reduce(other),
    }
}
