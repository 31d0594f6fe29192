//! The pulsefleet data model.
//!
//! `Service` and `Params` are immutable after load; `Observation` is
//! produced once per probe and owned by the store; `AggregateResult`
//! is the per-cycle summary every output surface consumes.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{MissingStatusPolicy, Status};

/// Process-wide defaults (see `Params`).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(15_000);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3_000);
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_CONCURRENCY: u32 = 10;

/// One monitored service, immutable after config load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// Unique, non-empty identity within the fleet.
    pub name: String,
    /// Absolute `http:` or `https:` health URL.
    pub url: String,
    /// When set, a probe whose normalized status differs is an
    /// expectation failure (recorded as `down`).
    pub expect_status: Option<Status>,
    pub tags: BTreeSet<String>,
    /// Per-service headers, overlaid on the global set.
    pub headers: BTreeMap<String, String>,
    /// Per-service proxy, beating the global proxy and the environment.
    pub proxy: Option<String>,
    /// Per-service timeout, beating the global timeout.
    pub timeout: Option<Duration>,
}

/// Requested output shape for one-shot runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Ndjson,
}

/// Process-wide probe parameters, immutable after construction.
#[derive(Debug, Clone)]
pub struct Params {
    pub interval: Duration,
    pub timeout: Duration,
    pub retries: u32,
    /// In-flight probe cap; 0 means unlimited.
    pub concurrency: u32,
    /// Global headers applied to every probe (services overlay these).
    pub headers: BTreeMap<String, String>,
    pub proxy: Option<String>,
    /// Skip TLS verification on outbound HTTPS (direct and via proxy).
    pub insecure: bool,
    /// Emit one structured debug record per completed request.
    pub debug: bool,
    pub missing_status: MissingStatusPolicy,
    pub output: OutputFormat,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            concurrency: DEFAULT_CONCURRENCY,
            headers: BTreeMap::new(),
            proxy: None,
            insecure: false,
            debug: false,
            missing_status: MissingStatusPolicy::default(),
            output: OutputFormat::default(),
        }
    }
}

/// Request phase timings, either payload-reported or measured.
///
/// Only `total_ms` is guaranteed; the phase splits exist when the
/// service reports them in its health payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub total_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttfb_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ms: Option<f64>,
}

/// A single probe's outcome, one per service per cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub service: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<Timings>,
    /// Wall clock at the moment the probe started.
    pub checked_at: DateTime<Utc>,
    /// Decoded health payload, kept for detail rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Latency percentiles over the latest observations of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Per-service view inside an aggregate: the latest observation plus
/// staleness metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Milliseconds between the latest observation and cycle completion.
    pub age_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub url: String,
    pub checked_at: DateTime<Utc>,
}

/// One cycle's derived summary.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub status: Status,
    pub results: Vec<ServiceSnapshot>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_defaults_match_contract() {
        let p = Params::default();
        assert_eq!(p.interval, Duration::from_millis(15_000));
        assert_eq!(p.timeout, Duration::from_millis(3_000));
        assert_eq!(p.retries, 1);
        assert_eq!(p.concurrency, 10);
        assert!(!p.insecure);
        assert_eq!(p.missing_status, MissingStatusPolicy::Down);
    }

    #[test]
    fn observation_serializes_without_empty_fields() {
        let obs = Observation {
            service: "api".to_string(),
            status: Status::Ok,
            http_status: Some(200),
            latency_ms: Some(12.0),
            timings: None,
            checked_at: Utc::now(),
            payload: None,
            error: None,
            version: None,
            region: None,
        };
        let json = serde_json::to_string(&obs).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(!json.contains("error"));
        assert!(!json.contains("timings"));
    }
}
