//! Concurrency gate — a fair FIFO cap on in-flight work.
//!
//! Thin wrapper over `tokio::sync::Semaphore` (which queues waiters in
//! FIFO order) with active/pending counters for observability.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Caps how many futures run concurrently through [`run`](Gate::run).
///
/// A limit of 0 means unlimited.
#[derive(Debug, Clone)]
pub struct Gate {
    semaphore: Option<Arc<Semaphore>>,
    active: Arc<AtomicUsize>,
    pending: Arc<AtomicUsize>,
}

impl Gate {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: (limit > 0).then(|| Arc::new(Semaphore::new(limit))),
            active: Arc::new(AtomicUsize::new(0)),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `fut` once a permit is available, returning its output.
    pub async fn run<T>(&self, fut: impl std::future::Future<Output = T>) -> T {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let _permit = match &self.semaphore {
            Some(s) => Some(
                s.clone()
                    .acquire_owned()
                    .await
                    .expect("gate semaphore never closes"),
            ),
            None => None,
        };
        self.pending.fetch_sub(1, Ordering::SeqCst);

        self.active.fetch_add(1, Ordering::SeqCst);
        let out = fut.await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        out
    }

    /// Futures currently executing inside the gate.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Futures waiting for a permit.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}
