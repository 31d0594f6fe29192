//! Backoff policies.
//!
//! Two unrelated escalations share this module: `ExponentialBackoff`
//! paces retries *within* one probe, `ServiceBackoff` widens the probe
//! interval *across* cycles for a service that keeps failing.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;

/// Parameters for [`ExponentialBackoff`].
#[derive(Debug, Clone)]
pub struct BackoffOptions {
    /// First delay; floored at 1ms.
    pub initial: Duration,
    /// Growth factor per attempt; values ≤ 1 fall back to 2.
    pub factor: f64,
    /// Upper bound on any single delay.
    pub max: Option<Duration>,
    /// Jitter band, as fractions of the computed delay.
    /// `jitter_min ≤ jitter_max < 1`; both 0 disables jitter.
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            factor: 2.0,
            max: Some(Duration::from_secs(30)),
            jitter_min: 0.0,
            jitter_max: 0.0,
        }
    }
}

impl BackoffOptions {
    fn sanitized(mut self) -> Self {
        if self.initial < Duration::from_millis(1) {
            self.initial = Duration::from_millis(1);
        }
        if self.factor <= 1.0 {
            self.factor = 2.0;
        }
        self.jitter_max = self.jitter_max.clamp(0.0, 0.999);
        self.jitter_min = self.jitter_min.clamp(0.0, self.jitter_max);
        self
    }
}

/// Exponentially growing, jittered delay sequence.
///
/// Each call to [`next_delay`](Self::next_delay) advances an internal
/// attempt counter; [`reset`](Self::reset) rewinds it. Every returned
/// delay is at least 1ms.
#[derive(Debug)]
pub struct ExponentialBackoff {
    options: BackoffOptions,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(options: BackoffOptions) -> Self {
        Self {
            options: options.sanitized(),
            attempt: 0,
        }
    }

    /// The delay for the next retry: `initial × factorⁿ ± jitter`,
    /// clamped into `[1ms, max]`.
    pub fn next_delay(&mut self) -> Duration {
        let n = self.attempt;
        self.attempt = self.attempt.saturating_add(1);

        let base = self.options.initial.as_millis() as f64 * self.options.factor.powi(n as i32);
        let jittered = apply_jitter(
            base,
            self.options.jitter_min,
            self.options.jitter_max,
            &mut rand::thread_rng(),
        );

        let max_ms = self
            .options
            .max
            .map(|m| (m.as_millis() as f64).max(1.0))
            .unwrap_or(f64::MAX);
        Duration::from_millis(jittered.round().clamp(1.0, max_ms) as u64)
    }

    /// Rewind to the first-attempt delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// `value × (1 + sign × magnitude)` with magnitude drawn uniformly
/// from `[jitter_min, jitter_max)` and sign ±1 at p = ½.
pub(crate) fn apply_jitter(value: f64, jitter_min: f64, jitter_max: f64, rng: &mut impl Rng) -> f64 {
    if jitter_max <= 0.0 {
        return value;
    }
    let magnitude = if jitter_max > jitter_min {
        jitter_min + (jitter_max - jitter_min) * rng.gen::<f64>()
    } else {
        jitter_min
    };
    let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
    value * (1.0 + sign * magnitude)
}

/// Per-service interval multiplier ladder.
///
/// A service that keeps probing `down` climbs `[1, g, g², …]` up to
/// `max_multiplier`; one success removes it from the map entirely.
/// The orchestrator applies the multiplier to the *base interval* of
/// the next cycle, never to retry delays within a cycle.
#[derive(Debug)]
pub struct ServiceBackoff {
    levels: Vec<u32>,
    index: HashMap<String, usize>,
}

impl ServiceBackoff {
    /// Ladder with growth factor `growth` clamped at `max_multiplier`.
    pub fn new(max_multiplier: u32, growth: u32) -> Self {
        let max = max_multiplier.max(1);
        let growth = growth.max(2);
        let mut levels = vec![1u32];
        loop {
            let next = levels.last().copied().unwrap_or(1).saturating_mul(growth);
            if next >= max {
                if levels.last() != Some(&max) {
                    levels.push(max);
                }
                break;
            }
            levels.push(next);
        }
        Self {
            levels,
            index: HashMap::new(),
        }
    }

    /// Advance the service one rung (saturating at the top) and return
    /// its new multiplier. The first failure lands on the bottom rung.
    pub fn record_failure(&mut self, name: &str) -> u32 {
        let next = match self.index.get(name) {
            None => 0,
            Some(i) => (i + 1).min(self.levels.len() - 1),
        };
        self.index.insert(name.to_string(), next);
        self.levels[next]
    }

    /// Forget the service; its multiplier is 1 again.
    pub fn record_success(&mut self, name: &str) {
        self.index.remove(name);
    }

    /// Current multiplier, 1 when the service has no failure history.
    pub fn multiplier(&self, name: &str) -> u32 {
        self.index
            .get(name)
            .map(|i| self.levels[*i])
            .unwrap_or(1)
    }
}

impl Default for ServiceBackoff {
    fn default() -> Self {
        Self::new(4, 2)
    }
}
