//! Prometheus textfile exposition.
//!
//! Rendered by hand because the byte layout is contractual: HELP/TYPE
//! headers, escaped label values, LF endings, trailing newline. The
//! output must stay `promtool check metrics` clean.

use std::fmt::Write;

use pulse_core::AggregateResult;

/// Render the three health gauges for one aggregate.
///
/// `health_latency_ms` is omitted for services without a known
/// latency; the `region` label appears only when known.
pub fn render_prometheus(aggregate: &AggregateResult) -> String {
    let mut out = String::new();

    out.push_str("# HELP health_status 1=ok, 0.5=degraded, 0=down\n");
    out.push_str("# TYPE health_status gauge\n");
    for result in &aggregate.results {
        let _ = writeln!(
            out,
            "health_status{{{}}} {}",
            labels(&result.name, result.region.as_deref()),
            result.status.gauge_value()
        );
    }

    out.push_str("# HELP health_latency_ms last observed latency\n");
    out.push_str("# TYPE health_latency_ms gauge\n");
    for result in &aggregate.results {
        if let Some(latency) = result.latency_ms.filter(|l| l.is_finite()) {
            let _ = writeln!(
                out,
                "health_latency_ms{{{}}} {latency}",
                labels(&result.name, result.region.as_deref()),
            );
        }
    }

    out.push_str("# HELP health_scrape_timestamp_ms unix epoch ms\n");
    out.push_str("# TYPE health_scrape_timestamp_ms gauge\n");
    let _ = writeln!(
        out,
        "health_scrape_timestamp_ms {}",
        aggregate.completed_at.timestamp_millis()
    );

    out
}

fn labels(service: &str, region: Option<&str>) -> String {
    match region {
        Some(region) => format!(
            "service=\"{}\",region=\"{}\"",
            escape_label(service),
            escape_label(region)
        ),
        None => format!("service=\"{}\"", escape_label(service)),
    }
}

/// Escaping per the exposition format: backslash, newline, quote.
fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}
