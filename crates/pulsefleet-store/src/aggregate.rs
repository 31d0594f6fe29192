//! Fleet aggregation: worst-of status and latency percentiles.

use chrono::{DateTime, Utc};

use pulse_core::{AggregateResult, LatencySummary, Service, ServiceSnapshot, Status};

use crate::store::ObservationStore;

/// Worst status present wins; an empty fleet is `ok`.
pub fn compute_aggregate_status(statuses: impl IntoIterator<Item = Status>) -> Status {
    statuses.into_iter().max().unwrap_or(Status::Ok)
}

/// Interpolating percentile over an ascending-sorted sample.
///
/// Position `p × (n−1)` with linear interpolation between neighbors.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let position = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let low = position.floor() as usize;
            let high = position.ceil() as usize;
            if low == high {
                sorted[low]
            } else {
                let fraction = position - low as f64;
                sorted[low] + (sorted[high] - sorted[low]) * fraction
            }
        }
    }
}

/// p50/p95/p99 over the finite samples; `None` when there are none.
pub fn latency_summary(latencies: &[f64]) -> Option<LatencySummary> {
    let mut finite: Vec<f64> = latencies.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    Some(LatencySummary {
        p50: percentile(&finite, 0.50),
        p95: percentile(&finite, 0.95),
        p99: percentile(&finite, 0.99),
    })
}

/// Build a cycle's aggregate from the latest observation of every
/// service that has one, in fleet order.
pub async fn aggregate(
    store: &ObservationStore,
    services: &[Service],
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> AggregateResult {
    let mut results = Vec::with_capacity(services.len());
    for service in services {
        let Some(latest) = store.latest(&service.name).await else {
            continue;
        };
        let age_ms = (completed_at - latest.checked_at).num_milliseconds().max(0) as u64;
        results.push(ServiceSnapshot {
            name: latest.service.clone(),
            status: latest.status,
            http_status: latest.http_status,
            latency_ms: latest.latency_ms,
            age_ms,
            version: latest.version.clone(),
            region: latest.region.clone(),
            error: latest.error.clone(),
            url: service.url.clone(),
            checked_at: latest.checked_at,
        });
    }

    let status = compute_aggregate_status(results.iter().map(|r| r.status));
    let latencies: Vec<f64> = results.iter().filter_map(|r| r.latency_ms).collect();
    let latency = latency_summary(&latencies);

    AggregateResult {
        status,
        results,
        started_at,
        completed_at,
        latency,
    }
}
