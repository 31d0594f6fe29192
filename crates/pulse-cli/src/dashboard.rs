//! Terminal dashboard for `pulse run`.
//!
//! Clear-and-redraw on every aggregate: a fleet summary line, the
//! latency percentiles, and one row per service with its error (if
//! any) underneath. Rendered URLs are credential-redacted.

use std::io::Write as _;

use pulse_core::{redact_url_credentials, AggregateResult, ServiceSnapshot, Status};

const CLEAR: &str = "\x1b[2J\x1b[H";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

fn status_color(status: Status) -> &'static str {
    match status {
        Status::Ok => "\x1b[32m",
        Status::Degraded => "\x1b[33m",
        Status::Down => "\x1b[31m",
    }
}

/// Clear the screen and paint the current aggregate.
pub fn draw(result: &AggregateResult) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "{CLEAR}{}", render(result));
    let _ = stdout.flush();
}

/// Pure renderer, separated from the terminal for testing.
pub fn render(result: &AggregateResult) -> String {
    let mut out = String::new();

    let fleet_color = status_color(result.status);
    out.push_str(&format!(
        "{BOLD}pulsefleet{RESET}  fleet: {fleet_color}{}{RESET}  {} services  {}\n",
        result.status,
        result.results.len(),
        result.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
    ));

    match &result.latency {
        Some(summary) => out.push_str(&format!(
            "latency p50 {}  p95 {}  p99 {}\n\n",
            fmt_ms(summary.p50),
            fmt_ms(summary.p95),
            fmt_ms(summary.p99),
        )),
        None => out.push_str("latency -\n\n"),
    }

    out.push_str(&format!(
        "{BOLD}{:<20} {:<10} {:<6} {:<10} {:<7} URL{RESET}\n",
        "SERVICE", "STATUS", "HTTP", "LATENCY", "AGE"
    ));
    for snapshot in &result.results {
        out.push_str(&render_row(snapshot));
    }

    out
}

fn render_row(snapshot: &ServiceSnapshot) -> String {
    let color = status_color(snapshot.status);
    let mut row = format!(
        "{:<20} {color}{:<10}{RESET} {:<6} {:<10} {:<7} {}\n",
        truncate(&snapshot.name, 20),
        snapshot.status,
        snapshot
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        snapshot.latency_ms.map(fmt_ms).unwrap_or_else(|| "-".to_string()),
        fmt_age(snapshot.age_ms),
        redact_url_credentials(&snapshot.url),
    );
    if let Some(error) = &snapshot.error {
        row.push_str(&format!("  └ {error}\n"));
    }
    row
}

fn fmt_ms(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:.1}s", value / 1000.0)
    } else if value == value.trunc() {
        format!("{}ms", value as i64)
    } else {
        format!("{value:.1}ms")
    }
}

fn fmt_age(ms: u64) -> String {
    match ms {
        0..=999 => "<1s".to_string(),
        1_000..=59_999 => format!("{}s", ms / 1_000),
        _ => format!("{}m", ms / 60_000),
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pulse_core::LatencySummary;

    fn sample() -> AggregateResult {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        AggregateResult {
            status: Status::Down,
            results: vec![
                ServiceSnapshot {
                    name: "api".to_string(),
                    status: Status::Ok,
                    http_status: Some(200),
                    latency_ms: Some(12.0),
                    age_ms: 120,
                    version: Some("1.0.0".to_string()),
                    region: None,
                    error: None,
                    url: "https://user:pw@api.test/health".to_string(),
                    checked_at: at,
                },
                ServiceSnapshot {
                    name: "search".to_string(),
                    status: Status::Down,
                    http_status: None,
                    latency_ms: None,
                    age_ms: 61_000,
                    version: None,
                    region: None,
                    error: Some("request timed out after 3000ms (service=search, attempt=2, url=http://search.test/health)".to_string()),
                    url: "http://search.test/health".to_string(),
                    checked_at: at,
                },
            ],
            started_at: at,
            completed_at: at,
            latency: Some(LatencySummary {
                p50: 12.0,
                p95: 12.0,
                p99: 12.0,
            }),
        }
    }

    #[test]
    fn renders_summary_rows_and_errors() {
        let text = render(&sample());
        assert!(text.contains("fleet: "));
        assert!(text.contains("down"));
        assert!(text.contains("api"));
        assert!(text.contains("search"));
        assert!(text.contains("└ request timed out"));
        assert!(text.contains("p50 12ms"));
    }

    #[test]
    fn urls_are_credential_redacted() {
        let text = render(&sample());
        assert!(text.contains("user:[redacted]@api.test"));
        assert!(!text.contains(":pw@"));
    }

    #[test]
    fn formats_latency_and_age() {
        assert_eq!(fmt_ms(12.0), "12ms");
        assert_eq!(fmt_ms(80.5), "80.5ms");
        assert_eq!(fmt_ms(1500.0), "1.5s");
        assert_eq!(fmt_age(500), "<1s");
        assert_eq!(fmt_age(61_000), "1m");
        assert_eq!(fmt_age(3_000), "3s");
    }

    #[test]
    fn long_names_are_truncated() {
        let truncated = truncate("a-very-long-service-name-indeed", 20);
        assert!(truncated.chars().count() <= 20);
        assert!(truncated.ends_with('…'));
    }
}
