// src/constants.rs

//! Application-wide names and defaults.

/// Name of the application directory under the user's config and cache dirs.
pub const APP_DIR: &str = "loupe";

/// Name of the optional configuration file (inside the config dir).
pub const CONFIG_FILENAME: &str = "config.toml";

/// Name of the default log file (inside the cache dir).
pub const LOG_FILENAME: &str = "loupe.log";

/// Prefix of the per-session temporary directory.
pub const WORKSPACE_PREFIX: &str = "loupe-";

/// Name of the named pipe the tracer writes to (inside the session dir).
pub const TRACE_FIFO_NAME: &str = "strace.fifo";

/// Tracer used when no configuration says otherwise.
pub const DEFAULT_TRACER: &str = "strace";

/// Flag that tells the tracer where to write its output.
pub const DEFAULT_OUTPUT_FLAG: &str = "-o";

/// Overrides the tracer program.
pub const ENV_TRACER: &str = "LOUPE_TRACER";

/// Overrides the configuration file path.
pub const ENV_CONFIG: &str = "LOUPE_CONFIG";

/// Upper bound of events reduced between two redraws.
pub const MAX_EVENTS_PER_FRAME: usize = 256;
