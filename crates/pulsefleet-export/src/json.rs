//! JSON and NDJSON renderings of an aggregate.

use chrono::SecondsFormat;
use serde::Serialize;

use pulse_core::{AggregateResult, LatencySummary, ServiceSnapshot, Status};

#[derive(Serialize)]
struct JsonDocument {
    aggregate: JsonAggregate,
    checked_at: String,
    results: Vec<JsonResult>,
}

#[derive(Serialize)]
struct JsonAggregate {
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency: Option<LatencySummary>,
}

#[derive(Serialize)]
struct JsonResult {
    name: String,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    checked_at: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl JsonResult {
    fn from_snapshot(snapshot: &ServiceSnapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            status: snapshot.status,
            latency_ms: snapshot.latency_ms,
            version: snapshot.version.clone(),
            region: snapshot.region.clone(),
            checked_at: iso8601(snapshot.checked_at),
            url: snapshot.url.clone(),
            error: snapshot.error.clone(),
        }
    }
}

fn iso8601(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The `check` document: 2-space indent, trailing newline.
pub fn render_json(aggregate: &AggregateResult) -> Result<String, serde_json::Error> {
    let document = JsonDocument {
        aggregate: JsonAggregate {
            status: aggregate.status,
            latency: aggregate.latency,
        },
        checked_at: iso8601(aggregate.completed_at),
        results: aggregate
            .results
            .iter()
            .map(JsonResult::from_snapshot)
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&document)? + "\n")
}

/// One result object per line; empty output for an empty fleet.
pub fn render_ndjson(aggregate: &AggregateResult) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for snapshot in &aggregate.results {
        out.push_str(&serde_json::to_string(&JsonResult::from_snapshot(snapshot))?);
        out.push('\n');
    }
    Ok(out)
}
