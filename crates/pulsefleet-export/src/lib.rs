//! pulsefleet-export — render a cycle's aggregate for consumers.
//!
//! Three byte-stable formats: the Prometheus textfile exposition for
//! node_exporter-style collectors, a pretty JSON document for `check`,
//! and NDJSON for line-oriented pipelines. The renderers are pure
//! string builders; no I/O happens here.

pub mod json;
pub mod prometheus;

pub use json::{render_json, render_ndjson};
pub use prometheus::render_prometheus;
