//! Duration string parsing for config and flags.
//!
//! The accepted grammar is strict: `<digits>` followed by one of `ms`,
//! `s` or `m`. Anything else is a usage error rather than a silent
//! default, so a typo in a config never probes at the wrong cadence.

use std::time::Duration;

use crate::error::UsageError;

/// Parse a duration string such as `500ms`, `3s` or `1m`.
pub fn parse_duration(input: &str) -> Result<Duration, UsageError> {
    let s = input.trim();

    // Order matters: `ms` must be tried before the bare `s` suffix.
    let (digits, unit) = if let Some(d) = s.strip_suffix("ms") {
        (d, Unit::Millis)
    } else if let Some(d) = s.strip_suffix('s') {
        (d, Unit::Secs)
    } else if let Some(d) = s.strip_suffix('m') {
        (d, Unit::Mins)
    } else {
        return Err(UsageError::InvalidDuration(input.to_string()));
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UsageError::InvalidDuration(input.to_string()));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| UsageError::InvalidDuration(input.to_string()))?;

    Ok(match unit {
        Unit::Millis => Duration::from_millis(value),
        Unit::Secs => Duration::from_secs(value),
        Unit::Mins => Duration::from_secs(value * 60),
    })
}

enum Unit {
    Millis,
    Secs,
    Mins,
}

/// Render a duration in the most compact config-compatible unit.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms == 0 {
        return "0ms".to_string();
    }
    if ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{ms}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(parse_duration(" 15s ").unwrap(), Duration::from_secs(15));
    }

    #[test]
    fn rejects_missing_unit() {
        assert!(parse_duration("1500").is_err());
    }

    #[test]
    fn rejects_fractions_and_negatives() {
        assert!(parse_duration("1.5s").is_err());
        assert!(parse_duration("-3s").is_err());
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(parse_duration("3h").is_err());
        assert!(parse_duration("10sec").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn formats_compactly() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(15)), "15s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
    }
}
