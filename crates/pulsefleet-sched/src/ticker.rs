//! Jittered periodic ticker with pause/resume.
//!
//! A single timer task owns the schedule; control commands arrive on a
//! channel and ticks fan out on a broadcast channel. Pausing records
//! the residual delay (planned fire minus now) so resuming does not
//! restart the full interval. Subscribers that fall behind simply miss
//! ticks — the broadcast channel never queues them up for later.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::backoff::apply_jitter;

/// Ticker parameters. Jitter bounds are fractions of the base
/// interval; each tick's delay is `base × (1 ± [jitter_min, jitter_max))`.
#[derive(Debug, Clone)]
pub struct TickerOptions {
    pub interval: Duration,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl Default for TickerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(15_000),
            jitter_min: 0.10,
            jitter_max: 0.20,
        }
    }
}

/// One scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Monotonic tick number, starting at 1.
    pub seq: u64,
}

#[derive(Debug)]
enum Cmd {
    Start,
    Stop,
    Pause,
    Resume,
}

/// Handle to the timer task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct Ticker {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    tick_tx: broadcast::Sender<Tick>,
}

impl Ticker {
    /// Spawn the timer task in the idle state; call
    /// [`start`](Self::start) to arm the first delay.
    pub fn new(options: TickerOptions) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (tick_tx, _) = broadcast::channel(8);
        tokio::spawn(timer_task(options, cmd_rx, tick_tx.clone()));
        Self { cmd_tx, tick_tx }
    }

    /// Receive future ticks. Each subscriber sees every tick it is
    /// fast enough to consume.
    pub fn subscribe(&self) -> broadcast::Receiver<Tick> {
        self.tick_tx.subscribe()
    }

    /// Arm the first jittered delay. Idempotent while running.
    pub fn start(&self) {
        let _ = self.cmd_tx.send(Cmd::Start);
    }

    /// Cancel the pending tick; no further ticks fire until `start`.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(Cmd::Stop);
    }

    /// Cancel the pending tick but remember how much of the delay was
    /// left.
    pub fn pause(&self) {
        let _ = self.cmd_tx.send(Cmd::Pause);
    }

    /// Re-arm with the recorded residual, or a fresh jittered delay if
    /// there is none.
    pub fn resume(&self) {
        let _ = self.cmd_tx.send(Cmd::Resume);
    }
}

async fn timer_task(
    options: TickerOptions,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    tick_tx: broadcast::Sender<Tick>,
) {
    let mut running = false;
    let mut paused = false;
    // Invariant: `planned` is Some exactly when running and not paused.
    let mut planned: Option<Instant> = None;
    let mut residual: Option<Duration> = None;
    let mut seq: u64 = 0;

    loop {
        let cmd = if let Some(fire_at) = planned {
            tokio::select! {
                cmd = cmd_rx.recv() => cmd,
                _ = tokio::time::sleep_until(fire_at) => {
                    seq += 1;
                    trace!(seq, "tick");
                    let _ = tick_tx.send(Tick { seq });
                    planned = Some(Instant::now() + jittered_delay(&options));
                    continue;
                }
            }
        } else {
            cmd_rx.recv().await
        };

        match cmd {
            None => break,
            Some(Cmd::Start) => {
                if !running {
                    running = true;
                    paused = false;
                    residual = None;
                    planned = Some(Instant::now() + jittered_delay(&options));
                    debug!(interval_ms = options.interval.as_millis() as u64, "ticker started");
                }
            }
            Some(Cmd::Stop) => {
                running = false;
                paused = false;
                planned = None;
                residual = None;
                debug!("ticker stopped");
            }
            Some(Cmd::Pause) => {
                if running && !paused {
                    paused = true;
                    residual =
                        planned.map(|fire_at| fire_at.saturating_duration_since(Instant::now()));
                    planned = None;
                    debug!(residual_ms = residual.unwrap_or_default().as_millis() as u64, "ticker paused");
                }
            }
            Some(Cmd::Resume) => {
                if running && paused {
                    paused = false;
                    let delay = residual.take().unwrap_or_else(|| jittered_delay(&options));
                    planned = Some(Instant::now() + delay);
                    debug!(delay_ms = delay.as_millis() as u64, "ticker resumed");
                }
            }
        }
    }
}

/// One tick delay: the base interval with symmetric jitter, floored at
/// 1ms.
fn jittered_delay(options: &TickerOptions) -> Duration {
    let base = options.interval.as_millis() as f64;
    let jittered = apply_jitter(
        base,
        options.jitter_min.clamp(0.0, 0.999),
        options.jitter_max.clamp(0.0, 0.999),
        &mut rand::thread_rng(),
    );
    Duration::from_millis(jittered.round().max(1.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast(interval_ms: u64) -> TickerOptions {
        TickerOptions {
            interval: Duration::from_millis(interval_ms),
            jitter_min: 0.10,
            jitter_max: 0.20,
        }
    }

    async fn recv_within(
        rx: &mut broadcast::Receiver<Tick>,
        ms: u64,
    ) -> Result<Tick, tokio::time::error::Elapsed> {
        tokio::time::timeout(Duration::from_millis(ms), async {
            rx.recv().await.expect("ticker task alive")
        })
        .await
    }

    #[test]
    fn delays_stay_inside_the_jitter_envelope() {
        let options = fast(1000);
        for _ in 0..200 {
            let d = jittered_delay(&options).as_millis() as f64;
            assert!(d >= 800.0 - 1.0, "delay {d} below envelope");
            assert!(d <= 1200.0 + 1.0, "delay {d} above envelope");
        }
    }

    #[test]
    fn delays_never_drop_below_one_ms() {
        let options = TickerOptions {
            interval: Duration::from_millis(1),
            jitter_min: 0.9,
            jitter_max: 0.9,
        };
        for _ in 0..50 {
            assert!(jittered_delay(&options) >= Duration::from_millis(1));
        }
    }

    #[tokio::test]
    async fn ticks_arrive_after_start() {
        let ticker = Ticker::new(fast(30));
        let mut rx = ticker.subscribe();
        ticker.start();

        let first = recv_within(&mut rx, 500).await.expect("first tick");
        assert_eq!(first.seq, 1);
        let second = recv_within(&mut rx, 500).await.expect("second tick");
        assert_eq!(second.seq, 2);
    }

    #[tokio::test]
    async fn no_ticks_before_start() {
        let ticker = Ticker::new(fast(20));
        let mut rx = ticker.subscribe();
        assert!(recv_within(&mut rx, 120).await.is_err());
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let ticker = Ticker::new(fast(40));
        let mut rx = ticker.subscribe();
        let started = std::time::Instant::now();
        ticker.start();
        ticker.start();
        ticker.start();

        for expected_seq in 1..=3 {
            let tick = recv_within(&mut rx, 500).await.expect("tick");
            assert_eq!(tick.seq, expected_seq);
        }
        // One schedule delivers three ticks in at least 3 × 32ms;
        // duplicate schedules would deliver them almost back-to-back.
        assert!(
            started.elapsed() >= Duration::from_millis(90),
            "ticks arrived too fast: {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn stop_silences_the_ticker() {
        let ticker = Ticker::new(fast(20));
        let mut rx = ticker.subscribe();
        ticker.start();
        recv_within(&mut rx, 500).await.expect("tick before stop");
        ticker.stop();
        // Drain anything already in flight, then expect silence.
        tokio::time::sleep(Duration::from_millis(10)).await;
        while rx.try_recv().is_ok() {}
        assert!(recv_within(&mut rx, 150).await.is_err());
    }

    #[tokio::test]
    async fn pause_holds_and_resume_continues() {
        let ticker = Ticker::new(fast(60));
        let mut rx = ticker.subscribe();
        ticker.start();
        ticker.pause();

        // Longer than the interval: nothing may fire while paused.
        assert!(recv_within(&mut rx, 150).await.is_err());

        ticker.resume();
        // The residual is at most one full jittered interval.
        recv_within(&mut rx, 300).await.expect("tick after resume");
    }

    #[tokio::test]
    async fn resume_without_pause_is_a_no_op() {
        let ticker = Ticker::new(fast(30));
        let mut rx = ticker.subscribe();
        ticker.start();
        ticker.resume();
        let first = recv_within(&mut rx, 500).await.expect("tick");
        assert_eq!(first.seq, 1);
    }
}
