//! Retry harness: an attempt loop around one fallible async operation.
//!
//! One `ExponentialBackoff` instance is shared across all sleeps of a
//! single `retry` call, so the delays grow across attempts. The final
//! error is always the error that terminated the last attempt;
//! cancellation during a sleep aborts the loop without inventing a
//! timeout.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backoff::{BackoffOptions, ExponentialBackoff};

/// How many retries to grant and how to pace them.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    /// Additional attempts after the first; 0 disables retries.
    pub retries: u32,
    pub backoff: BackoffOptions,
}

/// Why a `retry` call gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The last permitted attempt failed (or the predicate declined a
    /// retry); carries that attempt's error unchanged.
    Operation(E),
    /// The cancellation token fired while waiting to retry.
    Cancelled,
}

/// Run `op` up to `retries + 1` times.
///
/// `op` receives the 1-based attempt number. After a failure the
/// `should_retry` predicate is consulted with the error and the
/// attempt that produced it; declining re-raises that error.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut should_retry: impl FnMut(&E, u32) -> bool,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let attempts = policy.retries.saturating_add(1);
    let mut backoff = ExponentialBackoff::new(policy.backoff.clone());
    let mut attempt = 1u32;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= attempts || !should_retry(&error, attempt) {
                    return Err(RetryError::Operation(error));
                }
                let delay = backoff.next_delay();
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
