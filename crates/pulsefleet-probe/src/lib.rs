//! pulsefleet-probe — the probe pipeline and its supervisor.
//!
//! The integration point of the system: on every ticker tick the
//! supervisor fans probe jobs out through the concurrency gate, each
//! job runs the retry harness around a pooled HTTP request, the
//! response is normalized into the status vocabulary, and the
//! resulting observations land in the store before one
//! `AggregateResult` is emitted for the cycle.
//!
//! ```text
//! Ticker ──tick──▶ Supervisor
//!                    ├─ countdown check (service backoff widening)
//!                    ├─ Gate ─▶ retry() ─▶ http request ─▶ normalize
//!                    ├─ ObservationStore.add(...)
//!                    └─ aggregate() ─▶ watch channel
//! ```

pub mod error;
pub mod normalize;
pub mod prober;
pub mod supervisor;

pub use error::{ProbeError, ProbeFailure};
pub use normalize::{normalize_status, resolve_latency};
pub use prober::{probe_service, ProbeContext};
pub use supervisor::Supervisor;
