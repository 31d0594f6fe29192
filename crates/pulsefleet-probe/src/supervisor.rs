//! The cycle supervisor — ties ticker, gate, retry, HTTP and store
//! together.
//!
//! One cycle per tick: services whose backoff countdown reached zero
//! are probed concurrently (bounded by the gate), all observations are
//! joined before bookkeeping, and exactly one `AggregateResult` is
//! emitted per cycle. Cycles never overlap — ticks that fire while a
//! cycle is still running are coalesced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pulse_core::{AggregateResult, Params, Service, Status};
use pulsefleet_http::{ClientPool, HttpResult, PoolOptions, ProxyClientCache, ProxyEnv};
use pulsefleet_sched::{Gate, ServiceBackoff, Ticker, TickerOptions};
use pulsefleet_store::{aggregate, ObservationStore};

use crate::prober::{probe_service, ProbeContext};

/// Default per-service history depth.
const DEFAULT_HISTORY: usize = 64;

/// Owns the fleet and drives probe cycles.
///
/// Shared state (store, backoff, countdowns) is only mutated here, in
/// one critical section per cycle after all probes have joined.
pub struct Supervisor {
    services: Vec<Service>,
    params: Params,
    store: Arc<ObservationStore>,
    backoff: Mutex<ServiceBackoff>,
    /// Ticks to skip per service; probed when the count reaches zero.
    countdowns: Mutex<HashMap<String, u32>>,
    gate: Gate,
    pool: ClientPool,
    proxies: ProxyClientCache,
    proxy_env: ProxyEnv,
    agg_tx: watch::Sender<Option<AggregateResult>>,
}

impl Supervisor {
    pub fn new(services: Vec<Service>, params: Params) -> HttpResult<Arc<Self>> {
        Self::with_history(services, params, DEFAULT_HISTORY)
    }

    pub fn with_history(
        services: Vec<Service>,
        params: Params,
        history: usize,
    ) -> HttpResult<Arc<Self>> {
        let pool_options = PoolOptions::default();
        let (agg_tx, _) = watch::channel(None);
        Ok(Arc::new(Self {
            gate: Gate::new(params.concurrency as usize),
            pool: ClientPool::new(pool_options.clone())?,
            proxies: ProxyClientCache::new(pool_options),
            proxy_env: ProxyEnv::from_env(),
            store: Arc::new(ObservationStore::new(history)),
            backoff: Mutex::new(ServiceBackoff::default()),
            countdowns: Mutex::new(HashMap::new()),
            services,
            params,
            agg_tx,
        }))
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn store(&self) -> Arc<ObservationStore> {
        Arc::clone(&self.store)
    }

    /// Receive each cycle's aggregate. The slot starts as `None`.
    pub fn subscribe(&self) -> watch::Receiver<Option<AggregateResult>> {
        self.agg_tx.subscribe()
    }

    /// Current interval multiplier for a service (test and dashboard
    /// visibility).
    pub fn multiplier(&self, service: &str) -> u32 {
        self.backoff
            .lock()
            .expect("backoff lock poisoned")
            .multiplier(service)
    }

    /// Run exactly one probe cycle and return its aggregate.
    pub async fn run_cycle(self: &Arc<Self>, cancel: &CancellationToken) -> AggregateResult {
        let started_at = Utc::now();

        // Countdown pass: a service widened to multiplier m is skipped
        // on m−1 of every m ticks.
        let due: Vec<usize> = {
            let mut countdowns = self.countdowns.lock().expect("countdown lock poisoned");
            self.services
                .iter()
                .enumerate()
                .filter_map(|(index, service)| {
                    let remaining = countdowns.entry(service.name.clone()).or_insert(0);
                    if *remaining > 0 {
                        *remaining -= 1;
                    }
                    (*remaining == 0).then_some(index)
                })
                .collect()
        };
        debug!(due = due.len(), fleet = self.services.len(), "cycle starting");

        let mut jobs = JoinSet::new();
        for index in due {
            let supervisor = Arc::clone(self);
            let cancel = cancel.clone();
            jobs.spawn(async move {
                let service = &supervisor.services[index];
                supervisor
                    .gate
                    .run(probe_service(ProbeContext {
                        service,
                        params: &supervisor.params,
                        pool: &supervisor.pool,
                        proxies: &supervisor.proxies,
                        proxy_env: &supervisor.proxy_env,
                        cancel: &cancel,
                    }))
                    .await
            });
        }

        let mut observations = Vec::new();
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(observation) => observations.push(observation),
                Err(join_error) => error!(error = %join_error, "probe task panicked"),
            }
        }

        // Backoff bookkeeping, one critical section for the cycle.
        {
            let mut backoff = self.backoff.lock().expect("backoff lock poisoned");
            let mut countdowns = self.countdowns.lock().expect("countdown lock poisoned");
            for observation in &observations {
                match observation.status {
                    Status::Ok => {
                        backoff.record_success(&observation.service);
                        countdowns.insert(observation.service.clone(), 0);
                    }
                    Status::Down => {
                        let multiplier = backoff.record_failure(&observation.service);
                        countdowns.insert(observation.service.clone(), multiplier);
                        if multiplier > 1 {
                            info!(
                                service = %observation.service,
                                multiplier,
                                "service interval widened"
                            );
                        }
                    }
                    // Degraded keeps the previous multiplier: no
                    // escalation, no reset.
                    Status::Degraded => {
                        let multiplier = backoff.multiplier(&observation.service);
                        countdowns.insert(observation.service.clone(), multiplier);
                    }
                }
            }
        }

        for observation in observations {
            self.store.add(observation).await;
        }

        let completed_at = Utc::now();
        let result = aggregate(&self.store, &self.services, started_at, completed_at).await;
        debug!(
            status = %result.status,
            services = result.results.len(),
            "cycle completed"
        );
        self.agg_tx.send_replace(Some(result.clone()));
        result
    }

    /// Run cycles until cancelled: one immediately, then one per tick.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let ticker = Ticker::new(TickerOptions {
            interval: self.params.interval,
            ..TickerOptions::default()
        });
        let mut ticks = ticker.subscribe();
        ticker.start();
        info!(
            services = self.services.len(),
            interval_ms = self.params.interval.as_millis() as u64,
            "supervisor started"
        );

        // First cycle right away so every surface has data before the
        // first tick lands.
        self.run_cycle(&cancel).await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    ticker.stop();
                    break;
                }
                received = ticks.recv() => match received {
                    Ok(_tick) => {
                        self.run_cycle(&cancel).await;
                        self.drain_coalesced(&mut ticks);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "ticks coalesced");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }

        self.pool.close();
        info!("supervisor stopped");
    }

    /// Drop ticks that fired while the last cycle was running; the
    /// next cycle waits for a fresh tick.
    fn drain_coalesced(&self, ticks: &mut broadcast::Receiver<pulsefleet_sched::Tick>) {
        let mut dropped = 0u64;
        loop {
            match ticks.try_recv() {
                Ok(_) => dropped += 1,
                Err(broadcast::error::TryRecvError::Lagged(n)) => dropped += n,
                Err(_) => break,
            }
        }
        if dropped > 0 {
            warn!(dropped, "cycle overran the interval, ticks coalesced");
        }
    }
}
