// src/system/supervisor.rs

//! Runs the target command under the tracer and owns its lifecycle.

use crate::{
    CancellationToken,
    core::settings::Settings,
    models::Stream,
    system::workspace::TraceWorkspace,
};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failures while starting or wiring up the supervised process.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// No target command was given.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// The target program is not on `PATH` and is not an existing path.
    #[error("Command '{0}' could not be found.")]
    CommandNotFound(String),
    /// The tracer program is not on `PATH` and is not an existing path.
    #[error("Tracer '{0}' could not be found. Install it or point LOUPE_TRACER at it.")]
    TracerNotFound(String),
    /// The temporary directory for the trace channel could not be created.
    #[error("Could not prepare the session workspace: {0}")]
    Workspace(#[source] io::Error),
    /// Spawning the tracer failed.
    #[error("Tracer '{program}' could not be started: {source}")]
    Spawn {
        /// The tracer program that failed to start.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },
    /// The pipe was already taken or never set up.
    #[error("The {0} pipe of the traced command is not available.")]
    MissingPipe(Stream),
}

/// Owns the tracer process (which runs the target command), its pipes and
/// the temporary workspace used for the trace channel.
///
/// Dropping the supervisor tears the session down: a still-running tracer is
/// terminated and reaped, then the workspace is removed.
#[derive(Debug)]
pub struct ProcessSupervisor {
    child: Arc<Mutex<Child>>,
    pid: u32,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    watcher: ExitWatcher,
    cancellation_token: CancellationToken,
    shutdown_grace: Duration,
    trace_retry: Duration,
    command_line: String,
    is_shut_down: bool,
    // Declared last: removed only after the tracer is gone.
    workspace: TraceWorkspace,
}

impl ProcessSupervisor {
    /// Starts `command` under the configured tracer.
    ///
    /// The tracer and the target are resolved before anything is spawned, so
    /// a missing binary fails here rather than as trace output.
    pub fn spawn(settings: &Settings, command: &[String]) -> Result<Self, SupervisorError> {
        let (program, args) = command.split_first().ok_or(SupervisorError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(SupervisorError::EmptyCommand);
        }

        let tracer = resolve_program(&settings.tracer)
            .ok_or_else(|| SupervisorError::TracerNotFound(settings.tracer.clone()))?;
        if resolve_program(program).is_none() {
            return Err(SupervisorError::CommandNotFound(program.clone()));
        }

        let workspace = TraceWorkspace::create().map_err(SupervisorError::Workspace)?;

        let mut child = Command::new(&tracer)
            .args(&settings.tracer_args)
            .arg(&settings.output_flag)
            .arg(workspace.channel_path())
            .arg(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SupervisorError::Spawn {
                program: tracer.display().to_string(),
                source: e,
            })?;

        let pid = child.id();
        let command_line = shlex::try_join(command.iter().map(String::as_str))
            .unwrap_or_else(|_| command.join(" "));
        log::debug!(
            "Spawned tracer '{}' (PID: {}) for: {}",
            tracer.display(),
            pid,
            command_line
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let child = Arc::new(Mutex::new(child));
        let cancellation_token: CancellationToken = Arc::new(AtomicBool::new(false));
        let watcher = ExitWatcher::new(
            Arc::clone(&child),
            settings.exit_poll_interval(),
            Arc::clone(&cancellation_token),
        );

        Ok(Self {
            child,
            pid,
            stdout,
            stderr,
            watcher,
            cancellation_token,
            shutdown_grace: settings.shutdown_grace(),
            trace_retry: settings.trace_retry_interval(),
            command_line,
            is_shut_down: false,
            workspace,
        })
    }

    /// Hands out the read end of the target's stdout. Succeeds once.
    pub fn take_stdout(&mut self) -> Result<ChildStdout, SupervisorError> {
        self.stdout
            .take()
            .ok_or(SupervisorError::MissingPipe(Stream::Stdout))
    }

    /// Hands out the read end of the target's stderr. Succeeds once.
    pub fn take_stderr(&mut self) -> Result<ChildStderr, SupervisorError> {
        self.stderr
            .take()
            .ok_or(SupervisorError::MissingPipe(Stream::Stderr))
    }

    /// A handle that waits for the process to exit.
    pub fn exit_watcher(&self) -> ExitWatcher {
        self.watcher.clone()
    }

    /// Describes where and how to read the tracer's output.
    pub fn trace_channel(&self) -> TraceChannel {
        TraceChannel {
            path: self.workspace.channel_path().to_path_buf(),
            is_fifo: self.workspace.is_fifo(),
            retry_interval: self.trace_retry,
            watcher: self.watcher.clone(),
        }
    }

    /// Set when the session is being torn down; background workers poll it.
    pub fn cancellation_token(&self) -> CancellationToken {
        Arc::clone(&self.cancellation_token)
    }

    /// The shell-quoted command line being traced.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// The per-session temporary directory.
    pub fn workspace_dir(&self) -> &Path {
        self.workspace.dir_path()
    }

    /// Process id of the tracer.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Stops background waiters and terminates the tracer if it is still
    /// running. Idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.is_shut_down = true;
        self.cancellation_token.store(true, Ordering::SeqCst);

        if self.watcher.try_status().is_some() {
            return;
        }

        log::debug!("Tracer (PID: {}) still running, sending SIGTERM.", self.pid);
        match i32::try_from(self.pid) {
            Ok(raw) => {
                if let Err(errno) = signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
                    log::warn!("Failed to signal tracer (PID: {}): {}", self.pid, errno);
                }
            }
            Err(_) => log::warn!("Tracer PID {} does not fit a pid_t.", self.pid),
        }

        let deadline = Instant::now() + self.shutdown_grace;
        while Instant::now() < deadline {
            if self.watcher.try_status().is_some() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }

        log::warn!(
            "Tracer (PID: {}) ignored SIGTERM for {:?}, killing it.",
            self.pid,
            self.shutdown_grace
        );
        let mut child = lock_child(&self.child);
        if let Err(e) = child.kill() {
            log::warn!("Failed to kill tracer (PID: {}): {}", self.pid, e);
        }
        match child.wait() {
            Ok(status) => {
                self.watcher.record(status);
            }
            Err(e) => log::warn!("Failed to reap tracer (PID: {}): {}", self.pid, e),
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Waits for the supervised process to exit.
///
/// Clones share one status cell: once any of them observes the exit, every
/// clone reports the same code from then on.
#[derive(Debug, Clone)]
pub struct ExitWatcher {
    child: Arc<Mutex<Child>>,
    status: Arc<OnceLock<i32>>,
    poll_interval: Duration,
    cancellation_token: CancellationToken,
}

impl ExitWatcher {
    fn new(
        child: Arc<Mutex<Child>>,
        poll_interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            child,
            status: Arc::new(OnceLock::new()),
            poll_interval,
            cancellation_token,
        }
    }

    /// Returns the exit code if the process has exited, without blocking.
    pub fn try_status(&self) -> Option<i32> {
        if let Some(code) = self.status.get() {
            return Some(*code);
        }
        let mut child = lock_child(&self.child);
        match child.try_wait() {
            Ok(Some(status)) => Some(self.record(status)),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Error while checking tracer status: {}", e);
                None
            }
        }
    }

    /// Blocks until the process exits and returns its exit code.
    ///
    /// Returns `None` if the session is cancelled first.
    pub fn wait(&self) -> Option<i32> {
        loop {
            if let Some(code) = self.try_status() {
                return Some(code);
            }
            if self.cancellation_token.load(Ordering::SeqCst) {
                return None;
            }
            // Wait briefly to avoid a tight loop consuming CPU.
            thread::sleep(self.poll_interval);
        }
    }

    fn record(&self, status: ExitStatus) -> i32 {
        *self.status.get_or_init(|| exit_code(status))
    }
}

/// Location of the tracer's output and how to follow it.
#[derive(Debug, Clone)]
pub struct TraceChannel {
    /// Where the tracer writes.
    pub path: PathBuf,
    /// `true` for a named pipe, `false` for a plain file read in tail mode.
    pub is_fifo: bool,
    /// Delay between open attempts and between tail reads.
    pub retry_interval: Duration,
    /// Tells the reader when the tracer is gone.
    pub watcher: ExitWatcher,
}

impl TraceChannel {
    /// Unblocks a reader stuck opening the fifo because the tracer exited
    /// without ever opening its end. Harmless if a writer already came and went.
    ///
    /// Returns `true` if a reader was waiting and got released. A non-blocking
    /// write open fails with `ENXIO` while nobody has the fifo open for
    /// reading, so `false` means no reader was there yet.
    pub fn release_pending_reader(&self) -> bool {
        if !self.is_fifo {
            return false;
        }
        match std::fs::OpenOptions::new()
            .write(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(&self.path)
        {
            Ok(_) => {
                log::debug!("Released pending reader on '{}'", self.path.display());
                true
            }
            Err(e) => {
                log::debug!(
                    "No pending reader on '{}' to release: {}",
                    self.path.display(),
                    e
                );
                false
            }
        }
    }
}

/// Maps an exit status to a shell-style code: `128 + signal` for signal deaths.
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Finds an executable: paths containing a separator are checked directly,
/// bare names are looked up on `PATH`.
fn resolve_program(name: &str) -> Option<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(name);
        return path.is_file().then_some(path);
    }
    which::which(name).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Writes a stand-in tracer: it writes `trace_line` to the file named by
    /// its `-o` argument, then `exec`s the remaining arguments.
    pub(crate) fn fake_tracer(dir: &TempDir, trace_line: &str) -> Settings {
        let script = dir.path().join("fake-strace");
        let body = format!(
            "#!/bin/sh\nout=\"$2\"\nshift 2\nprintf '%s\\n' '{}' > \"$out\"\nexec \"$@\"\n",
            trace_line
        );
        fs::write(&script, body).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        Settings {
            tracer: script.display().to_string(),
            exit_poll_ms: 5,
            trace_retry_ms: 5,
            shutdown_grace_ms: 200,
            ..Settings::default()
        }
    }

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_spawn_rejects_empty_command() {
        let result = ProcessSupervisor::spawn(&Settings::default(), &[]);
        assert!(matches!(result, Err(SupervisorError::EmptyCommand)));
    }

    #[test]
    fn test_spawn_reports_missing_tracer() {
        let settings = Settings {
            tracer: "/definitely/not/a/tracer".to_string(),
            ..Settings::default()
        };
        let result = ProcessSupervisor::spawn(&settings, &cmd(&["true"]));
        assert!(matches!(result, Err(SupervisorError::TracerNotFound(_))));
    }

    #[test]
    fn test_spawn_reports_missing_command() {
        let dir = TempDir::new().unwrap();
        let settings = fake_tracer(&dir, "noop");
        let result = ProcessSupervisor::spawn(&settings, &cmd(&["no-such-command-loupe-test"]));
        assert!(matches!(result, Err(SupervisorError::CommandNotFound(_))));
    }

    #[test]
    fn test_exit_code_is_reported_and_stays_put() {
        let dir = TempDir::new().unwrap();
        let settings = fake_tracer(&dir, "noop");
        let mut supervisor =
            ProcessSupervisor::spawn(&settings, &cmd(&["sh", "-c", "exit 2"])).unwrap();
        let channel = supervisor.trace_channel();
        // Drain the fifo so the fake tracer can get past its write.
        let reader = thread::spawn(move || {
            let mut text = String::new();
            fs::File::open(&channel.path)
                .unwrap()
                .read_to_string(&mut text)
                .unwrap();
            text
        });

        let watcher = supervisor.exit_watcher();
        assert_eq!(watcher.wait(), Some(2));
        assert_eq!(watcher.wait(), Some(2));
        assert_eq!(supervisor.exit_watcher().try_status(), Some(2));
        assert_eq!(reader.join().unwrap(), "noop\n");

        assert!(supervisor.take_stdout().is_ok());
        assert!(matches!(
            supervisor.take_stdout(),
            Err(SupervisorError::MissingPipe(Stream::Stdout))
        ));
    }

    #[test]
    fn test_signal_death_maps_to_128_plus_signal() {
        let status = ExitStatus::from_raw(9);
        assert_eq!(exit_code(status), 137);
        let status = ExitStatus::from_raw(3 << 8);
        assert_eq!(exit_code(status), 3);
    }

    #[test]
    fn test_drop_terminates_running_tracer_and_removes_workspace() {
        let dir = TempDir::new().unwrap();
        let settings = fake_tracer(&dir, "noop");
        let supervisor =
            ProcessSupervisor::spawn(&settings, &cmd(&["sleep", "30"])).unwrap();
        let workspace = supervisor.workspace_dir().to_path_buf();
        let watcher = supervisor.exit_watcher();
        let channel = supervisor.trace_channel();
        thread::spawn(move || {
            let mut sink = String::new();
            let _ = fs::File::open(&channel.path).map(|mut f| f.read_to_string(&mut sink));
        });

        assert!(workspace.exists());
        assert_eq!(watcher.try_status(), None);
        drop(supervisor);

        assert!(!workspace.exists());
        assert!(watcher.try_status().is_some());
    }

    #[test]
    fn test_release_unblocks_a_reader_when_no_writer_ever_comes() {
        let workspace = TraceWorkspace::create().unwrap();
        let path = workspace.channel_path().to_path_buf();
        let opener = {
            let path = path.clone();
            thread::spawn(move || fs::File::open(path).map(|_| ()).is_ok())
        };

        let dir = TempDir::new().unwrap();
        let settings = fake_tracer(&dir, "noop");
        let supervisor = ProcessSupervisor::spawn(&settings, &cmd(&["true"])).unwrap();
        let channel = TraceChannel {
            path,
            is_fifo: true,
            retry_interval: Duration::from_millis(5),
            watcher: supervisor.exit_watcher(),
        };

        // Keep releasing until the opener has attached.
        let mut released = false;
        while !opener.is_finished() {
            released |= channel.release_pending_reader();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(opener.join().unwrap());
        assert!(released);
        drop(supervisor);
    }
}
