// src/core/mod.rs

//! # Core Logic
//!
//! Pure session logic with no direct process or terminal access: trace
//! parsing, the session reducer and its loop, settings and paths.

pub mod paths;
pub mod session;
pub mod session_loop;
pub mod settings;
pub mod trace_parser;
