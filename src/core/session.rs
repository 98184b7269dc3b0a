// src/core/session.rs

//! # Session Reducer
//!
//! [`Session`] is the whole observable state of one supervised run. It is
//! changed only by [`Session::reduce`], which folds one [`Event`] at a time.
//!
//! Line buffers grow without bound for the life of the session. Nothing is
//! truncated, so the full history stays available for review after the
//! process exits.

use crate::core::trace_parser;
use crate::models::{
    Event, MuxEvent, ProcessStatus, SourceState, Stream, TraceEvent, UserInput, View,
};

/// Accumulated state of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    command: String,
    stdout: Vec<String>,
    stderr: Vec<String>,
    trace: Vec<String>,
    opened_files: Vec<String>,
    connections: Vec<String>,
    status: ProcessStatus,
    selected: View,
    sources: Sources,
    is_finished: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Sources {
    stdout: SourceState,
    stderr: SourceState,
    trace: SourceState,
}

impl Sources {
    fn get(&self, stream: Stream) -> &SourceState {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
            Stream::Trace => &self.trace,
        }
    }

    fn get_mut(&mut self, stream: Stream) -> &mut SourceState {
        match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
            Stream::Trace => &mut self.trace,
        }
    }
}

impl Session {
    /// A fresh, running session for `command` (used only for display).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Folds one event into the session.
    ///
    /// Once the session is finished (after `Quit`) every event is ignored.
    /// Presentation-only events never change the session.
    pub fn reduce(mut self, event: Event) -> Self {
        if self.is_finished {
            return self;
        }

        match event {
            Event::Mux(MuxEvent::OutputLine(stream, text)) => self.push_line(stream, text),
            Event::Mux(MuxEvent::ProcessExited(code)) => match self.status {
                ProcessStatus::Running => self.status = ProcessStatus::Exited(code),
                ProcessStatus::Exited(previous) => {
                    log::debug!(
                        "Ignoring exit code {} after the process already exited with {}.",
                        code,
                        previous
                    );
                }
            },
            Event::Mux(MuxEvent::SourceExhausted(stream)) => {
                let state = self.sources.get_mut(stream);
                if *state == SourceState::Live {
                    *state = SourceState::Exhausted;
                }
            }
            Event::Mux(MuxEvent::SourceFailed(stream, cause)) => {
                *self.sources.get_mut(stream) = SourceState::Failed(cause.to_string());
            }
            Event::Input(UserInput::NextView) => self.selected = self.selected.next(),
            Event::Input(UserInput::PreviousView) => self.selected = self.selected.previous(),
            Event::Input(UserInput::Quit) => self.is_finished = true,
            Event::View(_) => {}
        }

        self
    }

    fn push_line(&mut self, stream: Stream, text: String) {
        match stream {
            Stream::Stdout => self.stdout.push(text),
            Stream::Stderr => self.stderr.push(text),
            Stream::Trace => {
                match trace_parser::parse_line(&text) {
                    Some(TraceEvent::FileOpened { path }) => self.opened_files.push(path),
                    Some(TraceEvent::ConnectionAttempted { address }) => {
                        self.connections.push(address);
                    }
                    None => {}
                }
                self.trace.push(text);
            }
        }
    }

    /// The shell-quoted command line being traced.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Lines of the given view, oldest first.
    pub fn lines(&self, view: View) -> &[String] {
        match view {
            View::Stdout => &self.stdout,
            View::Stderr => &self.stderr,
            View::Trace => &self.trace,
            View::Files => &self.opened_files,
            View::Connections => &self.connections,
        }
    }

    /// Whether the process is still running, or its exit code.
    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    /// The view currently shown.
    pub fn selected(&self) -> View {
        self.selected
    }

    /// Whether `stream` is still live, exhausted, or failed.
    pub fn source_state(&self, stream: Stream) -> &SourceState {
        self.sources.get(stream)
    }

    /// `true` once the user asked to quit. Terminal: nothing changes afterwards.
    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    /// `true` once the process exited and every stream has ended, i.e. no
    /// further output can arrive. The session stays open for review.
    pub fn is_complete(&self) -> bool {
        matches!(self.status, ProcessStatus::Exited(_))
            && Stream::ALL
                .iter()
                .all(|stream| *self.sources.get(*stream) != SourceState::Live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ViewCommand;
    use std::io;

    fn line(stream: Stream, text: &str) -> Event {
        Event::Mux(MuxEvent::OutputLine(stream, text.to_string()))
    }

    fn fold(session: Session, events: impl IntoIterator<Item = Event>) -> Session {
        events.into_iter().fold(session, Session::reduce)
    }

    #[test]
    fn test_lines_land_in_their_own_buffers_in_order() {
        let session = fold(
            Session::new("ls"),
            [
                line(Stream::Stdout, "o1"),
                line(Stream::Stderr, "e1"),
                line(Stream::Stdout, "o2"),
                line(Stream::Trace, "brk(NULL) = 0x1"),
                line(Stream::Stdout, "o3"),
            ],
        );
        assert_eq!(session.lines(View::Stdout), ["o1", "o2", "o3"]);
        assert_eq!(session.lines(View::Stderr), ["e1"]);
        assert_eq!(session.lines(View::Trace), ["brk(NULL) = 0x1"]);
        assert!(session.lines(View::Files).is_empty());
    }

    #[test]
    fn test_trace_lines_feed_the_derived_tables() {
        let session = fold(
            Session::new("curl"),
            [
                line(Stream::Trace, r#"openat(AT_FDCWD, "/etc/hosts", O_RDONLY) = 3"#),
                line(
                    Stream::Trace,
                    r#"connect(3, {sa_family=AF_INET, sin_port=htons(80), sin_addr=inet_addr("93.184.216.34")}, 16) = 0"#,
                ),
                line(Stream::Trace, "close(3) = 0"),
            ],
        );
        assert_eq!(session.lines(View::Trace).len(), 3);
        assert_eq!(session.lines(View::Files), ["/etc/hosts"]);
        assert_eq!(session.lines(View::Connections), ["93.184.216.34"]);
    }

    #[test]
    fn test_exit_status_is_never_overwritten() {
        let session = fold(
            Session::new("false"),
            [
                Event::Mux(MuxEvent::ProcessExited(2)),
                Event::Mux(MuxEvent::ProcessExited(0)),
                line(Stream::Stdout, "late"),
            ],
        );
        assert_eq!(session.status(), ProcessStatus::Exited(2));
        assert_eq!(session.lines(View::Stdout), ["late"]);
    }

    #[test]
    fn test_view_switch_wraps_both_ways() {
        let session = Session::new("x").reduce(UserInput::PreviousView.into());
        assert_eq!(session.selected(), View::Connections);
        let session = session.reduce(UserInput::NextView.into());
        assert_eq!(session.selected(), View::Stdout);

        let session = fold(session, (0..5).map(|_| UserInput::NextView.into()));
        assert_eq!(session.selected(), View::Stdout);
    }

    #[test]
    fn test_quit_is_terminal() {
        let session = fold(
            Session::new("x"),
            [
                line(Stream::Stdout, "before"),
                UserInput::Quit.into(),
                line(Stream::Stdout, "after"),
                UserInput::NextView.into(),
                Event::Mux(MuxEvent::ProcessExited(1)),
            ],
        );
        assert!(session.is_finished());
        assert_eq!(session.lines(View::Stdout), ["before"]);
        assert_eq!(session.selected(), View::Stdout);
        assert_eq!(session.status(), ProcessStatus::Running);
    }

    #[test]
    fn test_source_failure_and_exhaustion_are_tracked() {
        let session = fold(
            Session::new("x"),
            [
                Event::Mux(MuxEvent::SourceFailed(
                    Stream::Stderr,
                    io::Error::new(io::ErrorKind::BrokenPipe, "gone"),
                )),
                Event::Mux(MuxEvent::SourceExhausted(Stream::Stdout)),
                // A failed source stays failed.
                Event::Mux(MuxEvent::SourceExhausted(Stream::Stderr)),
            ],
        );
        assert_eq!(session.source_state(Stream::Stdout), &SourceState::Exhausted);
        assert_eq!(
            session.source_state(Stream::Stderr),
            &SourceState::Failed("gone".to_string())
        );
        assert_eq!(session.source_state(Stream::Trace), &SourceState::Live);
    }

    #[test]
    fn test_completion_needs_exit_and_all_streams_ended() {
        let mut session = Session::new("x").reduce(MuxEvent::ProcessExited(0).into());
        assert!(!session.is_complete());
        for stream in Stream::ALL {
            session = session.reduce(MuxEvent::SourceExhausted(stream).into());
        }
        assert!(session.is_complete());
        assert!(!session.is_finished());
    }

    #[test]
    fn test_view_commands_do_not_change_the_session() {
        let before = Session::new("x").reduce(line(Stream::Stdout, "a"));
        let after = before
            .clone()
            .reduce(ViewCommand::ScrollUp(3).into())
            .reduce(ViewCommand::Redraw.into());
        assert_eq!(before, after);
    }
}
