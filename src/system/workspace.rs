// src/system/workspace.rs

//! The temporary directory that holds the trace channel.

use crate::constants::{TRACE_FIFO_NAME, WORKSPACE_PREFIX};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Per-session temporary directory holding the tracer's output channel.
///
/// The channel is a named pipe when the platform allows it and a plain file
/// otherwise. Dropping the workspace removes the directory and everything in
/// it; a removal failure is logged and otherwise ignored.
#[derive(Debug)]
pub struct TraceWorkspace {
    dir: Option<TempDir>,
    channel: PathBuf,
    is_fifo: bool,
}

impl TraceWorkspace {
    /// Creates the directory and the channel inside it.
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(WORKSPACE_PREFIX).tempdir()?;
        let channel = dir.path().join(TRACE_FIFO_NAME);

        let is_fifo = match mkfifo(channel.as_path(), Mode::S_IRUSR | Mode::S_IWUSR) {
            Ok(()) => {
                log::debug!("Created trace fifo at '{}'", channel.display());
                true
            }
            Err(errno) => {
                // The tracer creates the plain file itself when it starts writing.
                log::warn!(
                    "Could not create fifo at '{}' ({}); falling back to a plain file.",
                    channel.display(),
                    errno
                );
                false
            }
        };

        Ok(Self {
            dir: Some(dir),
            channel,
            is_fifo,
        })
    }

    /// Path the tracer writes to and the trace reader opens.
    pub fn channel_path(&self) -> &Path {
        &self.channel
    }

    /// Whether the channel is a named pipe rather than a plain file.
    pub fn is_fifo(&self) -> bool {
        self.is_fifo
    }

    /// The session directory itself.
    pub fn dir_path(&self) -> &Path {
        self.channel.parent().unwrap_or(&self.channel)
    }
}

impl Drop for TraceWorkspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => log::debug!("Removed session workspace '{}'", path.display()),
            Err(e) => log::warn!(
                "Failed to remove session workspace '{}': {}",
                path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn test_create_makes_a_fifo_inside_a_fresh_dir() {
        let workspace = TraceWorkspace::create().unwrap();
        let meta = std::fs::metadata(workspace.channel_path()).unwrap();
        assert!(workspace.is_fifo());
        assert!(meta.file_type().is_fifo());
        assert_eq!(workspace.channel_path().parent(), Some(workspace.dir_path()));
    }

    #[test]
    fn test_drop_removes_the_directory() {
        let workspace = TraceWorkspace::create().unwrap();
        let dir = workspace.dir_path().to_path_buf();
        assert!(dir.exists());
        drop(workspace);
        assert!(!dir.exists());
    }

    #[test]
    fn test_two_workspaces_do_not_collide() {
        let a = TraceWorkspace::create().unwrap();
        let b = TraceWorkspace::create().unwrap();
        assert_ne!(a.dir_path(), b.dir_path());
    }
}
