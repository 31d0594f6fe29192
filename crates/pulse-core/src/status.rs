//! The normalized status vocabulary.
//!
//! Every probe outcome collapses into one of three states, totally
//! ordered by severity so that a fleet aggregate is simply the worst
//! status present: `ok < degraded < down`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{UsageError, EXIT_DEGRADED, EXIT_DOWN, EXIT_OK};

/// Normalized health status of a single service or of the whole fleet.
///
/// The derive order matters: `Ord` must rank `Ok < Degraded < Down`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Degraded,
    Down,
}

impl Status {
    /// Lowercase wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Degraded => "degraded",
            Status::Down => "down",
        }
    }

    /// Exit code for a one-shot run that ended with this aggregate status.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => EXIT_OK,
            Status::Degraded => EXIT_DEGRADED,
            Status::Down => EXIT_DOWN,
        }
    }

    /// Gauge value for the Prometheus exposition: 1, 0.5 or 0.
    pub fn gauge_value(self) -> f64 {
        match self {
            Status::Ok => 1.0,
            Status::Degraded => 0.5,
            Status::Down => 0.0,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = UsageError;

    /// Case-insensitive, whitespace-tolerant parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Ok(Status::Ok),
            "degraded" => Ok(Status::Degraded),
            "down" => Ok(Status::Down),
            _ => Err(UsageError::UnknownStatus(s.to_string())),
        }
    }
}

/// What a 2xx response without a recognizable `status` field normalizes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingStatusPolicy {
    Degraded,
    #[default]
    Down,
}

impl MissingStatusPolicy {
    pub fn as_status(self) -> Status {
        match self {
            MissingStatusPolicy::Degraded => Status::Degraded,
            MissingStatusPolicy::Down => Status::Down,
        }
    }
}

impl FromStr for MissingStatusPolicy {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degraded" => Ok(MissingStatusPolicy::Degraded),
            "down" => Ok(MissingStatusPolicy::Down),
            _ => Err(UsageError::UnknownPolicy(s.to_string())),
        }
    }
}
