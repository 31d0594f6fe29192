//! Usage-error taxonomy and the exit-code contract.
//!
//! Probe-time failures are not here on purpose: they are per-cycle,
//! non-fatal, and live with the probe pipeline. This module covers
//! everything that should stop the process before a single probe is
//! issued, plus the code the process exits with afterwards.

use thiserror::Error;

/// Fleet aggregate was `ok`.
pub const EXIT_OK: i32 = 0;
/// Fleet aggregate was `degraded`.
pub const EXIT_DEGRADED: i32 = 1;
/// Fleet aggregate was `down`.
pub const EXIT_DOWN: i32 = 2;
/// Bad flags, bad config, unknown command.
pub const EXIT_USAGE: i32 = 3;
/// Invariant violation inside the core.
pub const EXIT_INTERNAL: i32 = 4;

/// Errors caused by the operator: flags, config file, environment.
///
/// All of these exit with [`EXIT_USAGE`].
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("invalid duration {0:?} (expected <number> followed by ms, s or m)")]
    InvalidDuration(String),

    #[error("invalid header {0:?} (expected \"Name: Value\")")]
    InvalidHeader(String),

    #[error("unknown status {0:?} (expected ok, degraded or down)")]
    UnknownStatus(String),

    #[error("unknown missing-status policy {0:?} (expected degraded or down)")]
    UnknownPolicy(String),

    #[error("unknown output format {0:?} (expected json or ndjson)")]
    UnknownFormat(String),

    #[error("--config <path> is required")]
    MissingConfig,

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// One line per violation, each prefixed with a JSON-pointer path.
    #[error("invalid config:\n{}", .0.join("\n"))]
    ConfigInvalid(Vec<String>),
}

impl UsageError {
    pub fn exit_code(&self) -> i32 {
        EXIT_USAGE
    }
}
