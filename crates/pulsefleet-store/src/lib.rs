//! pulsefleet-store — bounded observation history and aggregation.
//!
//! The store keeps the last N observations per service (drop-oldest on
//! overflow); the aggregator folds each service's latest observation
//! into the fleet status and the latency percentile summary consumed
//! by every output surface.
//!
//! Single-writer discipline: only the supervisor appends; everyone
//! else reads snapshots.

pub mod aggregate;
pub mod store;

pub use aggregate::{aggregate, compute_aggregate_status, latency_summary, percentile};
pub use store::ObservationStore;
