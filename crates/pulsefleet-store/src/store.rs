//! Per-service bounded observation history.

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

use pulse_core::Observation;

/// Maps service name → the last `capacity` observations, oldest first.
///
/// Appends keep arrival order; `checked_at` is non-decreasing within a
/// sequence because the supervisor appends cycle by cycle.
#[derive(Debug)]
pub struct ObservationStore {
    capacity: usize,
    inner: RwLock<HashMap<String, VecDeque<Observation>>>,
}

impl ObservationStore {
    /// Capacity is per service and must be at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an observation, dropping the oldest entry on overflow.
    pub async fn add(&self, observation: Observation) {
        let mut inner = self.inner.write().await;
        let history = inner
            .entry(observation.service.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(observation);
    }

    /// Copy of a service's history, oldest first.
    pub async fn history(&self, service: &str) -> Vec<Observation> {
        let inner = self.inner.read().await;
        inner
            .get(service)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The most recent observation for a service.
    pub async fn latest(&self, service: &str) -> Option<Observation> {
        let inner = self.inner.read().await;
        inner.get(service).and_then(|h| h.back().cloned())
    }

    /// Names of all services with at least one observation.
    pub async fn service_names(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_core::Status;

    fn obs(service: &str, marker: u16) -> Observation {
        Observation {
            service: service.to_string(),
            status: Status::Ok,
            http_status: Some(marker),
            latency_ms: Some(1.0),
            timings: None,
            checked_at: Utc::now(),
            payload: None,
            error: None,
            version: None,
            region: None,
        }
    }

    #[tokio::test]
    async fn keeps_insertion_order() {
        let store = ObservationStore::new(10);
        for marker in 0..4 {
            store.add(obs("api", marker)).await;
        }
        let history = store.history("api").await;
        let markers: Vec<u16> = history.iter().filter_map(|o| o.http_status).collect();
        assert_eq!(markers, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn overflow_drops_the_oldest() {
        let store = ObservationStore::new(3);
        for marker in 0..7 {
            store.add(obs("api", marker)).await;
        }
        let history = store.history("api").await;
        assert_eq!(history.len(), 3);
        let markers: Vec<u16> = history.iter().filter_map(|o| o.http_status).collect();
        assert_eq!(markers, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn length_is_min_of_adds_and_capacity() {
        let store = ObservationStore::new(5);
        for marker in 0..2 {
            store.add(obs("api", marker)).await;
        }
        assert_eq!(store.history("api").await.len(), 2);
        for marker in 2..20 {
            store.add(obs("api", marker)).await;
        }
        assert_eq!(store.history("api").await.len(), 5);
    }

    #[tokio::test]
    async fn latest_is_the_tail() {
        let store = ObservationStore::new(3);
        for marker in 0..5 {
            store.add(obs("api", marker)).await;
        }
        assert_eq!(store.latest("api").await.unwrap().http_status, Some(4));
    }

    #[tokio::test]
    async fn services_are_isolated() {
        let store = ObservationStore::new(2);
        store.add(obs("a", 1)).await;
        store.add(obs("b", 2)).await;
        assert_eq!(store.history("a").await.len(), 1);
        assert_eq!(store.history("b").await.len(), 1);
        assert!(store.latest("c").await.is_none());
        assert_eq!(store.service_names().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped_to_one() {
        let store = ObservationStore::new(0);
        store.add(obs("api", 1)).await;
        store.add(obs("api", 2)).await;
        let history = store.history("api").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].http_status, Some(2));
    }

    #[tokio::test]
    async fn checked_at_is_non_decreasing() {
        let store = ObservationStore::new(10);
        for marker in 0..5 {
            store.add(obs("api", marker)).await;
        }
        let history = store.history("api").await;
        for pair in history.windows(2) {
            assert!(pair[0].checked_at <= pair[1].checked_at);
        }
    }
}
