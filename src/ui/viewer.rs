// src/ui/viewer.rs

//! The ratatui frontend: header, tabs, scrollable viewport and footer.

use crate::core::session::Session;
use crate::core::session_loop::Frontend;
use crate::models::{ProcessStatus, SourceState, Stream, View, ViewCommand};
use anyhow::{Context, Result};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use std::ops::Range;

const HELP: &str = " Tab/\u{2190}\u{2192} switch view  \u{2191}\u{2193} PgUp/PgDn scroll  Home/End top/tail  q quit";

/// Scroll position of one view: `None` follows the tail, `Some(top)` pins
/// the first visible line.
pub type Position = Option<usize>;

/// Draws the session on a ratatui terminal.
///
/// Scroll state lives here and is kept per view, so switching tabs does not
/// lose the place in another one.
#[derive(Debug)]
pub struct Viewer<B: Backend> {
    terminal: Terminal<B>,
    positions: [Position; View::ALL.len()],
    viewport_height: usize,
}

impl<B: Backend> Viewer<B> {
    /// Wraps a terminal; every view starts out following its tail.
    pub fn new(terminal: Terminal<B>) -> Self {
        Self {
            terminal,
            positions: [None; View::ALL.len()],
            viewport_height: 0,
        }
    }

    fn position_mut(&mut self, view: View) -> Option<&mut Position> {
        self.positions.get_mut(view.index())
    }

    #[cfg(test)]
    fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }
}

impl<B: Backend> Frontend for Viewer<B> {
    fn draw(&mut self, session: &Session) -> Result<()> {
        let position = self
            .positions
            .get(session.selected().index())
            .copied()
            .flatten();
        let mut viewport_height = self.viewport_height;
        self.terminal
            .draw(|frame| viewport_height = render(frame, session, position))
            .context("Failed to draw the terminal")?;
        self.viewport_height = viewport_height;
        Ok(())
    }

    fn apply(&mut self, command: ViewCommand, session: &Session) {
        if command == ViewCommand::Redraw {
            if let Err(e) = self.terminal.clear() {
                log::warn!("Failed to clear the terminal after a resize: {}", e);
            }
            return;
        }

        let view = session.selected();
        let total = session.lines(view).len();
        let height = self.viewport_height;
        if let Some(position) = self.position_mut(view) {
            *position = scroll(*position, command, total, height);
        }
    }
}

/// Highest first-line index that still fills the viewport.
fn max_top(total: usize, height: usize) -> usize {
    total.saturating_sub(height)
}

/// Moves a scroll position. Scrolling down onto the last page resumes
/// following the tail.
pub fn scroll(position: Position, command: ViewCommand, total: usize, height: usize) -> Position {
    let last = max_top(total, height);
    let top = position.unwrap_or(last).min(last);

    match command {
        ViewCommand::ScrollUp(n) => Some(top.saturating_sub(usize::from(n))),
        ViewCommand::ScrollDown(n) => {
            let top = top.saturating_add(usize::from(n));
            (top < last).then_some(top)
        }
        ViewCommand::Top => Some(0),
        ViewCommand::Bottom => None,
        ViewCommand::Redraw => position,
    }
}

/// Range of line indices visible in a viewport of `height` rows.
pub fn visible_window(total: usize, height: usize, position: Position) -> Range<usize> {
    let last = max_top(total, height);
    let start = position.unwrap_or(last).min(last);
    let end = start.saturating_add(height).min(total);
    start..end
}

/// Renders one frame and returns the number of content rows available.
fn render(frame: &mut Frame<'_>, session: &Session, position: Position) -> usize {
    let [header, tabs, body, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(frame, header, session);
    render_tabs(frame, tabs, session.selected());
    let height = render_body(frame, body, session, position);
    render_footer(frame, footer, session);
    height
}

fn render_header(frame: &mut Frame<'_>, area: Rect, session: &Session) {
    let status = match session.status() {
        ProcessStatus::Running => Span::styled("running", Style::default().fg(Color::Cyan)),
        ProcessStatus::Exited(code) => {
            let color = if code == 0 { Color::Yellow } else { Color::Red };
            Span::styled(
                format!("exit {}", code),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )
        }
    };
    let line = Line::from(vec![
        Span::styled(" $ ", Style::default().fg(Color::DarkGray)),
        Span::raw(session.command()),
        Span::raw("  "),
        status,
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_tabs(frame: &mut Frame<'_>, area: Rect, selected: View) {
    let tabs = Tabs::new(View::ALL.iter().map(|view| view.title()))
        .select(selected.index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn render_body(frame: &mut Frame<'_>, area: Rect, session: &Session, position: Position) -> usize {
    let view = session.selected();
    let lines = session.lines(view);
    let height = usize::from(area.height.saturating_sub(2));
    let window = visible_window(lines.len(), height, position);

    let title = if position.is_none() {
        format!(" {} ({} lines, following) ", view.title(), lines.len())
    } else {
        format!(
            " {} ({}-{} of {}) ",
            view.title(),
            window.start.saturating_add(1),
            window.end,
            lines.len()
        )
    };
    let text: Vec<Line<'_>> = lines
        .get(window)
        .unwrap_or_default()
        .iter()
        .map(|line| Line::raw(line.as_str()))
        .collect();

    let paragraph = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);
    height
}

fn render_footer(frame: &mut Frame<'_>, area: Rect, session: &Session) {
    let mut spans = vec![Span::styled(HELP, Style::default().fg(Color::DarkGray))];
    for stream in Stream::ALL {
        if let SourceState::Failed(cause) = session.source_state(stream) {
            spans.push(Span::styled(
                format!("  {} failed: {}", stream, cause),
                Style::default().fg(Color::Red),
            ));
        }
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
