// src/models.rs

//! Shared data types that flow between the supervisor, the multiplexer, the
//! session reducer and the presentation layer.

use std::fmt;
use std::io;

/// One of the three raw byte sources read line by line during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Standard output of the traced command.
    Stdout,
    /// Standard error of the traced command (and of the tracer itself).
    Stderr,
    /// The tracer's output channel.
    Trace,
}

impl Stream {
    /// All streams, in display order.
    pub const ALL: [Self; 3] = [Self::Stdout, Self::Stderr, Self::Trace];

    /// Short lowercase label used in logs and the footer.
    pub fn label(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Trace => "strace",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The channel currently selected in the viewer.
///
/// Three views show raw streams; the last two show tables derived from the
/// trace stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum View {
    /// Captured standard output.
    #[default]
    Stdout,
    /// Captured standard error.
    Stderr,
    /// Raw tracer lines.
    Trace,
    /// Paths passed to the file-open family of calls.
    Files,
    /// Addresses passed to `connect`.
    Connections,
}

impl View {
    /// All views, in tab order.
    pub const ALL: [Self; 5] = [
        Self::Stdout,
        Self::Stderr,
        Self::Trace,
        Self::Files,
        Self::Connections,
    ];

    /// Position of this view in [`View::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::Stdout => 0,
            Self::Stderr => 1,
            Self::Trace => 2,
            Self::Files => 3,
            Self::Connections => 4,
        }
    }

    fn from_index(index: usize) -> Self {
        match index % Self::ALL.len() {
            0 => Self::Stdout,
            1 => Self::Stderr,
            2 => Self::Trace,
            3 => Self::Files,
            _ => Self::Connections,
        }
    }

    /// The next view, wrapping from the last back to the first.
    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// The previous view, wrapping from the first to the last.
    pub fn previous(self) -> Self {
        Self::from_index(self.index() + Self::ALL.len() - 1)
    }

    /// Tab title.
    pub fn title(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Trace => "strace",
            Self::Files => "files",
            Self::Connections => "connections",
        }
    }
}

/// Lifecycle of the supervised process as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessStatus {
    /// The process has not been reaped yet.
    #[default]
    Running,
    /// The process exited with this code (`128 + signal` when killed by a signal).
    Exited(i32),
}

/// A structured fact extracted from one tracer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A file-open family call named this path.
    FileOpened {
        /// Path argument, without its quotes.
        path: String,
    },
    /// A `connect` call targeted this address.
    ConnectionAttempted {
        /// Textual IPv4 or IPv6 address.
        address: String,
    },
}

/// Events produced by the multiplexer from its sources.
///
/// This is a closed set: adding a kind forces every `match` in the reducer
/// to be revisited.
#[derive(Debug)]
pub enum MuxEvent {
    /// A complete line read from one stream, terminator stripped.
    OutputLine(Stream, String),
    /// The supervised process exited with this code.
    ProcessExited(i32),
    /// The stream reached end-of-file and will produce nothing more.
    SourceExhausted(Stream),
    /// Reading the stream failed; it is treated as exhausted from now on.
    SourceFailed(Stream, io::Error),
}

/// Discrete user intents that change session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    /// Select the next view.
    NextView,
    /// Select the previous view.
    PreviousView,
    /// End the session.
    Quit,
}

/// Presentation-only commands. They never reach the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCommand {
    /// Scroll up by this many lines.
    ScrollUp(u16),
    /// Scroll down by this many lines.
    ScrollDown(u16),
    /// Jump to the first line.
    Top,
    /// Jump to the last line and follow new output.
    Bottom,
    /// The terminal changed size.
    Redraw,
}

/// Everything that can arrive at the session loop.
#[derive(Debug)]
pub enum Event {
    /// Output from a supervised source.
    Mux(MuxEvent),
    /// A state-changing user intent.
    Input(UserInput),
    /// A presentation-only command.
    View(ViewCommand),
}

impl From<MuxEvent> for Event {
    fn from(event: MuxEvent) -> Self {
        Self::Mux(event)
    }
}

impl From<UserInput> for Event {
    fn from(input: UserInput) -> Self {
        Self::Input(input)
    }
}

impl From<ViewCommand> for Event {
    fn from(command: ViewCommand) -> Self {
        Self::View(command)
    }
}

/// Per-stream source state tracked by the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceState {
    /// Still producing lines.
    #[default]
    Live,
    /// Reached end-of-file.
    Exhausted,
    /// Failed with this cause.
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_cycles_forward_through_all_five() {
        let mut view = View::Stdout;
        let mut seen = Vec::new();
        for _ in 0..View::ALL.len() {
            seen.push(view);
            view = view.next();
        }
        assert_eq!(seen, View::ALL.to_vec());
        assert_eq!(view, View::Stdout);
    }

    #[test]
    fn test_view_wraps_in_both_directions() {
        assert_eq!(View::Stdout.previous(), View::Connections);
        assert_eq!(View::Connections.next(), View::Stdout);
        assert_eq!(View::Trace.previous(), View::Stderr);
    }

    #[test]
    fn test_view_previous_inverts_next() {
        for view in View::ALL {
            assert_eq!(view.next().previous(), view);
        }
    }
}
