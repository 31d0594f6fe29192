//! pulse-core — shared primitives for the pulsefleet probe supervisor.
//!
//! Everything the other crates agree on lives here: the normalized
//! status vocabulary, duration parsing, the service/parameter data
//! model, config file loading and validation, credential redaction,
//! and the usage-error taxonomy with its exit-code contract.
//!
//! # Architecture
//!
//! ```text
//! config.rs   ──▶ Vec<Service> + Params        (validated fleet)
//! status.rs   ──▶ Status, MissingStatusPolicy  (ok < degraded < down)
//! types.rs    ──▶ Observation, AggregateResult (probe outcome records)
//! redact.rs   ──▶ [redacted] masking            (logs, diagnostics)
//! error.rs    ──▶ UsageError + exit codes       (0..=4)
//! ```
//!
//! This crate has no async surface and no I/O beyond reading the
//! config file; the probe pipeline crates build on top of it.

pub mod config;
pub mod duration;
pub mod error;
pub mod redact;
pub mod status;
pub mod types;

pub use config::{load_config, ConfigFile, Overrides};
pub use duration::{format_duration, parse_duration};
pub use error::{UsageError, EXIT_DEGRADED, EXIT_DOWN, EXIT_INTERNAL, EXIT_OK, EXIT_USAGE};
pub use redact::{redact_url_credentials, redact_values, REDACTED};
pub use status::{MissingStatusPolicy, Status};
pub use types::*;
