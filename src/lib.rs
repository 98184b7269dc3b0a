// src/lib.rs

//! `loupe` runs a command under a system-call tracer and shows its stdout,
//! stderr, raw trace and the files and connections it touched, live, in a
//! terminal viewer.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Shared stop flag for background threads.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
pub mod ui;
