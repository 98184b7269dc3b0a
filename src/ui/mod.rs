//! # Presentation Layer
//!
//! A thin ratatui/crossterm viewer over the session state. Nothing here
//! mutates the session; it only draws snapshots and turns terminal input
//! into events for the session loop.
//!
//! - **`terminal`**: raw mode and alternate screen setup and restore.
//! - **`input`**: decodes key and resize events on a background thread.
//! - **`viewer`**: the [`Frontend`](crate::core::session_loop::Frontend)
//!   that renders tabs, the scrollable viewport and the footer.

pub mod input;
pub mod terminal;
pub mod viewer;
