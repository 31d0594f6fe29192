//! One service's probe: retry harness around request + normalization.
//!
//! A probe always produces an `Observation` — failures are captured
//! into the record, never propagated, so one broken service cannot
//! take the cycle down with it.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pulse_core::{Observation, Params, Service, Status};
use pulsefleet_http::{request, ClientPool, Method, ProxyClientCache, ProxyEnv, RequestOptions};
use pulsefleet_sched::{retry, BackoffOptions, RetryError, RetryPolicy};

use crate::error::{ProbeError, ProbeFailure};
use crate::normalize::{normalize_status, resolve_latency};

/// Everything one probe job needs, borrowed from the supervisor.
pub struct ProbeContext<'a> {
    pub service: &'a Service,
    pub params: &'a Params,
    pub pool: &'a ClientPool,
    pub proxies: &'a ProxyClientCache,
    pub proxy_env: &'a ProxyEnv,
    pub cancel: &'a CancellationToken,
}

/// Probe one service, retrying transport failures per the configured
/// policy. Parse failures and expectation mismatches become `down`
/// observations without further attempts.
pub async fn probe_service(ctx: ProbeContext<'_>) -> Observation {
    let probe_started = Utc::now();
    let policy = RetryPolicy {
        retries: ctx.params.retries,
        backoff: BackoffOptions::default(),
    };

    let outcome = retry(
        &policy,
        ctx.cancel,
        // Default predicate: any transport error is worth another try.
        |_error: &ProbeError, _attempt| true,
        |attempt| run_attempt(&ctx, attempt),
    )
    .await;

    match outcome {
        Ok(observation) => observation,
        Err(RetryError::Operation(error)) => {
            debug!(service = %ctx.service.name, error = %error, "probe failed");
            failure_observation(ctx.service, probe_started, None, None, &error)
        }
        Err(RetryError::Cancelled) => Observation {
            service: ctx.service.name.clone(),
            status: Status::Down,
            http_status: None,
            latency_ms: None,
            timings: None,
            checked_at: probe_started,
            payload: None,
            error: Some("probe cancelled".to_string()),
            version: None,
            region: None,
        },
    }
}

async fn run_attempt(ctx: &ProbeContext<'_>, attempt: u32) -> Result<Observation, ProbeError> {
    let service = ctx.service;
    let attempt_started = Utc::now();

    // Global headers under, per-service headers on top.
    let mut headers = ctx.params.headers.clone();
    headers.extend(service.headers.clone());

    let options = RequestOptions {
        url: service.url.clone(),
        method: Method::GET,
        headers,
        body: None,
        timeout: Some(service.timeout.unwrap_or(ctx.params.timeout)),
        proxy: service.proxy.clone().or_else(|| ctx.params.proxy.clone()),
        insecure: ctx.params.insecure,
        debug: ctx.params.debug,
    };

    let response = request(ctx.pool, ctx.proxies, ctx.proxy_env, &options, ctx.cancel)
        .await
        .map_err(|e| ProbeError::new(&service.name, &service.url, attempt, e.into()))?;

    let measured_ms = response.total.as_secs_f64() * 1000.0;
    let http_status = response.status;

    let payload: Option<Value> = if response.body.trim().is_empty() {
        None
    } else {
        match serde_json::from_str(&response.body) {
            Ok(value) => Some(value),
            Err(parse_error) => {
                // Captured, not retried: the service answered, just not
                // with anything we can interpret.
                let error = ProbeError::new(
                    &service.name,
                    &service.url,
                    attempt,
                    ProbeFailure::Payload(parse_error),
                );
                return Ok(failure_observation(
                    service,
                    attempt_started,
                    Some(http_status),
                    Some(measured_ms),
                    &error,
                ));
            }
        }
    };

    let status = normalize_status(Some(http_status), payload.as_ref(), ctx.params.missing_status);

    if let Some(expected) = service.expect_status {
        if status != expected {
            let error = ProbeError::new(
                &service.name,
                &service.url,
                attempt,
                ProbeFailure::Expectation {
                    expected,
                    actual: status,
                },
            );
            return Ok(failure_observation(
                service,
                attempt_started,
                Some(http_status),
                Some(measured_ms),
                &error,
            ));
        }
    }

    let (latency_ms, timings) = resolve_latency(payload.as_ref(), Some(measured_ms));

    Ok(Observation {
        service: service.name.clone(),
        status,
        http_status: Some(http_status),
        latency_ms: Some(latency_ms),
        timings,
        checked_at: attempt_started,
        version: payload_field(payload.as_ref(), "version"),
        region: payload_field(payload.as_ref(), "region"),
        payload,
        error: None,
    })
}

fn payload_field(payload: Option<&Value>, key: &str) -> Option<String> {
    payload
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn failure_observation(
    service: &Service,
    checked_at: DateTime<Utc>,
    http_status: Option<u16>,
    latency_ms: Option<f64>,
    error: &ProbeError,
) -> Observation {
    Observation {
        service: service.name.clone(),
        status: Status::Down,
        http_status,
        latency_ms,
        timings: None,
        checked_at,
        payload: None,
        error: Some(error.to_string()),
        version: None,
        region: None,
    }
}
