//! Response normalization.
//!
//! Collapses `{http status, JSON payload, policy}` into the status
//! vocabulary, and picks the latency figure: a payload-reported
//! `timings.total_ms` always beats our own measurement, because the
//! service knows its internal handling time better than a client
//! watching the wire.

use serde_json::Value;

use pulse_core::{MissingStatusPolicy, Status, Timings};

/// Normalize a probe response into a status.
///
/// Non-2xx (or absent) HTTP status is `down` regardless of the body.
/// Within 2xx, a recognizable `status` field wins; anything else falls
/// back to the missing-status policy.
pub fn normalize_status(
    http_status: Option<u16>,
    payload: Option<&Value>,
    policy: MissingStatusPolicy,
) -> Status {
    let Some(code) = http_status else {
        return Status::Down;
    };
    if !(200..300).contains(&code) {
        return Status::Down;
    }
    if let Some(Value::Object(map)) = payload {
        if let Some(Value::String(raw)) = map.get("status") {
            if let Ok(status) = raw.parse::<Status>() {
                return status;
            }
        }
    }
    policy.as_status()
}

/// Resolve the latency for an observation.
///
/// Payload-reported `timings.total_ms` (number or numeric string)
/// wins and carries the phase splits along; otherwise the measured
/// latency; otherwise 0.
pub fn resolve_latency(payload: Option<&Value>, measured_ms: Option<f64>) -> (f64, Option<Timings>) {
    if let Some(timings) = payload.and_then(|p| p.get("timings")) {
        if let Some(total_ms) = coerce_ms(timings.get("total_ms")) {
            return (
                total_ms,
                Some(Timings {
                    total_ms,
                    ttfb_ms: coerce_ms(timings.get("ttfb_ms")),
                    dns_ms: coerce_ms(timings.get("dns_ms")),
                    tcp_ms: coerce_ms(timings.get("tcp_ms")),
                    tls_ms: coerce_ms(timings.get("tls_ms")),
                }),
            );
        }
    }
    if let Some(measured) = measured_ms.filter(|m| m.is_finite()) {
        return (measured, None);
    }
    (0.0, None)
}

/// A finite JSON number, or a string that parses into one.
fn coerce_ms(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
