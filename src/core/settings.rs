// src/core/settings.rs

//! # Settings
//!
//! Optional user configuration, read from `~/.config/loupe/config.toml`.
//! Every key has a default, so a missing file simply yields
//! [`Settings::default`]. A small set of environment variables override the
//! file after it is loaded.

use crate::constants::{DEFAULT_OUTPUT_FLAG, DEFAULT_TRACER, ENV_TRACER};
use crate::core::paths;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Failures while loading settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("Could not read settings file '{path}': {source}")]
    Io {
        /// The settings file.
        path: String,
        /// Underlying read error.
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not valid TOML or has unknown keys.
    #[error("Failed to parse settings file '{path}': {source}")]
    TomlParse {
        /// The settings file.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
    /// `log_file` names an unset variable or otherwise fails to expand.
    #[error("Failed to expand log file path '{0}': {1}")]
    Expand(String, String),
}

/// Runtime settings for a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Tracer program, looked up on `PATH` unless it contains a slash.
    pub tracer: String,
    /// Extra tracer flags, placed before the output flag.
    pub tracer_args: Vec<String>,
    /// Flag naming the tracer's output file.
    pub output_flag: String,
    /// Delay between attempts to open the trace channel, and between reads
    /// of a plain-file channel that is still being written.
    pub trace_retry_ms: u64,
    /// Exit watcher poll interval.
    pub exit_poll_ms: u64,
    /// How long teardown waits after SIGTERM before sending SIGKILL.
    pub shutdown_grace_ms: u64,
    /// Log destination. `~` and environment variables are expanded.
    pub log_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tracer: DEFAULT_TRACER.to_string(),
            tracer_args: Vec::new(),
            output_flag: DEFAULT_OUTPUT_FLAG.to_string(),
            trace_retry_ms: 50,
            exit_poll_ms: 50,
            shutdown_grace_ms: 500,
            log_file: None,
        }
    }
}

impl Settings {
    /// Loads settings from the default location and applies environment overrides.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = match paths::get_config_file_path() {
            Ok(path) => Self::load_from(&path)?,
            Err(e) => {
                log::debug!("No config location available ({}); using defaults.", e);
                Self::default()
            }
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| SettingsError::TomlParse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Applies overrides from an environment-like lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(tracer) = lookup(ENV_TRACER).filter(|t| !t.trim().is_empty()) {
            self.tracer = tracer;
        }
    }

    /// Resolves the log file path: the configured one, expanded, or the
    /// default under the user's cache dir. `None` means log to stderr.
    pub fn resolve_log_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        match &self.log_file {
            Some(template) => {
                let expanded = shellexpand::full(template)
                    .map_err(|e| SettingsError::Expand(template.clone(), e.to_string()))?;
                Ok(Some(PathBuf::from(expanded.into_owned())))
            }
            None => Ok(paths::get_default_log_path().ok()),
        }
    }

    /// `trace_retry_ms`, at least one millisecond.
    pub fn trace_retry_interval(&self) -> Duration {
        Duration::from_millis(self.trace_retry_ms.max(1))
    }

    /// `exit_poll_ms`, at least one millisecond.
    pub fn exit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.exit_poll_ms.max(1))
    }

    /// Grace period between SIGTERM and SIGKILL at teardown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
