//! # System Interaction Layer
//!
//! Everything that touches processes, pipes and the filesystem.
//!
//! ## Modules
//!
//! - **`supervisor`**: spawns the command under the tracer, watches for its
//!   exit and terminates it (SIGTERM, then SIGKILL) at teardown.
//! - **`workspace`**: the private temporary directory holding the trace
//!   FIFO, removed when the session ends.
//! - **`reader`**: blocking line reading over pipes, the FIFO, or a plain
//!   file that is still being written.
//! - **`multiplexer`**: one thread per source, fanned into a single ordered
//!   event feed for the session loop.

pub mod multiplexer;
pub mod reader;
pub mod supervisor;
pub mod workspace;
