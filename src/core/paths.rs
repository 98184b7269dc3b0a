// src/core/paths.rs

//! Locations of the config file and the default log file.

use crate::constants::{APP_DIR, CONFIG_FILENAME, ENV_CONFIG, LOG_FILENAME};
use lazy_static::lazy_static;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref LOUPE_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Failures while resolving application directories.
#[derive(Error, Debug)]
pub enum PathError {
    /// The platform reports no config directory.
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// The platform reports no cache directory.
    #[error("Could not find system cache directory.")]
    CacheDirNotFound,
    /// A directory could not be created.
    #[error("Could not create directory at '{path}': {source}")]
    DirCreation {
        /// The directory that could not be created.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Returns the path to the loupe configuration directory (`~/.config/loupe`).
///
/// Memoized: the first call computes the path, later calls clone the cached
/// value. The directory is not created; a missing config is not an error.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    let mut cached = LOUPE_CONFIG_DIR
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(APP_DIR);
    *cached = Some(config_path.clone());
    Ok(config_path)
}

/// Returns the configuration file path, honoring `LOUPE_CONFIG`.
pub fn get_config_file_path() -> Result<PathBuf, PathError> {
    if let Some(explicit) = std::env::var_os(ENV_CONFIG) {
        return Ok(PathBuf::from(explicit));
    }
    get_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Returns the default log file path (`~/.cache/loupe/loupe.log`), creating
/// its parent directory if needed.
pub fn get_default_log_path() -> Result<PathBuf, PathError> {
    let dir = dirs::cache_dir()
        .ok_or(PathError::CacheDirNotFound)?
        .join(APP_DIR);

    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| PathError::DirCreation {
            path: dir.display().to_string(),
            source: e,
        })?;
    }

    Ok(dir.join(LOG_FILENAME))
}
