//! pulsefleet-sched — scheduling machinery for the probe supervisor.
//!
//! Four independent pieces the orchestrator composes:
//!
//! ```text
//! Ticker              jittered periodic ticks, pause/resume with
//!                     residual-delay preservation
//! ExponentialBackoff  per-call-site retry delays (jittered, capped)
//! ServiceBackoff      per-service interval multiplier ladder
//! retry()             attempt loop around a fallible async operation
//! Gate                fair FIFO cap on in-flight work
//! ```
//!
//! None of these know anything about HTTP or services; they deal in
//! delays, attempts and permits only.

pub mod backoff;
pub mod gate;
pub mod retry;
pub mod ticker;

pub use backoff::{BackoffOptions, ExponentialBackoff, ServiceBackoff};
pub use gate::Gate;
pub use retry::{retry, RetryError, RetryPolicy};
pub use ticker::{Tick, Ticker, TickerOptions};
