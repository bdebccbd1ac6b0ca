//! Fixed-rate timers for hostsync.
//!
//! A session runs two of these: the simulation timer (`1 / tick_rate`) and
//! the state broadcast timer (`sync_interval`). Both sit in the session
//! actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* handle command */ }
//!         fire = sim_timer.wait() => {
//!             step(fire.elapsed);
//!             sim_timer.record_work_end();
//!         }
//!         _ = sync_timer.wait() => broadcast_state(),
//!     }
//! }
//! ```
//!
//! # Stopped timers
//!
//! A timer starts stopped. While stopped, [`IntervalTimer::wait`] pends
//! forever, so its `select!` branch simply never wins. [`start`] and
//! [`stop`] are idempotent: starting a running timer does not create a
//! second cadence.
//!
//! [`start`]: IntervalTimer::start
//! [`stop`]: IntervalTimer::stop

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the timer wakes up late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrunPolicy {
    /// Keep the original cadence: the next deadline is always the previous
    /// deadline plus one period, so the long-run rate is exact.
    #[default]
    KeepCadence,

    /// Forget the missed deadlines and schedule the next one a full
    /// period from now.
    Resync,

    /// Fire back-to-back to catch up, but at most `max_catchup` times;
    /// beyond that, resync.
    CatchUp { max_catchup: u32 },
}

/// Configuration for an [`IntervalTimer`].
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Time between fires.
    pub period: Duration,
    /// Overrun handling.
    pub policy: OverrunPolicy,
    /// Warn when the work recorded via `record_work_end` uses more than
    /// this fraction of the period (0.0–1.0).
    pub budget_warn_threshold: f64,
    /// Collect [`TimerMetrics`].
    pub metrics_enabled: bool,
    /// Random delay (0..max µs) added to the first fire after `start`, so
    /// rooms started together don't tick in lockstep.
    pub initial_jitter_us: u64,
}

impl TimerConfig {
    /// Shortest accepted period.
    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    /// A timer firing `hz` times per second. `hz` of 0 is treated as 1.
    pub fn from_rate_hz(hz: u32) -> Self {
        Self::from_period(Duration::from_secs_f64(1.0 / f64::from(hz.max(1))))
    }

    /// A timer firing every `period`.
    pub fn from_period(period: Duration) -> Self {
        Self {
            period,
            policy: OverrunPolicy::default(),
            budget_warn_threshold: 0.80,
            metrics_enabled: true,
            initial_jitter_us: 0,
        }
    }

    /// Builder-style jitter setter.
    pub fn with_jitter_us(mut self, max_us: u64) -> Self {
        self.initial_jitter_us = max_us;
        self
    }

    /// Builder-style policy setter.
    pub fn with_policy(mut self, policy: OverrunPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Clamps the period to [`Self::MIN_PERIOD`] and the threshold to
    /// `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(period_us = self.period.as_micros() as u64, "timer period too short, clamping to 1 ms");
            self.period = Self::MIN_PERIOD;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Fire info
// ---------------------------------------------------------------------------

/// Returned by [`IntervalTimer::wait`] for each fire.
#[derive(Debug, Clone)]
pub struct Fire {
    /// Fires since creation, starting at 1. Survives stop/start.
    pub count: u64,
    /// Nominal time covered by this fire (always one period).
    pub elapsed: Duration,
    /// The timer woke up more than 10% of a period late.
    pub overrun: bool,
    /// Whole periods dropped because of the overrun.
    pub skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters and timings, updated when `metrics_enabled` is set.
#[derive(Debug, Clone, Default)]
pub struct TimerMetrics {
    pub total_fires: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average (α = 0.1) of recorded work time.
    pub avg_work_time: Duration,
    pub max_work_time: Duration,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A restartable fixed-rate timer.
pub struct IntervalTimer {
    config: TimerConfig,
    /// Next deadline; `None` while stopped.
    next: Option<TokioInstant>,
    count: u64,
    work_start: Option<Instant>,
    metrics: TimerMetrics,
}

impl IntervalTimer {
    /// Creates a stopped timer.
    pub fn new(config: TimerConfig) -> Self {
        let config = config.validated();
        debug!(
            period_ms = config.period.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "interval timer created"
        );
        Self {
            config,
            next: None,
            count: 0,
            work_start: None,
            metrics: TimerMetrics::default(),
        }
    }

    /// Starts the timer; the first fire is one period (plus jitter) from
    /// now. No-op if already running.
    pub fn start(&mut self) {
        if self.next.is_some() {
            return;
        }
        let jitter = if self.config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..self.config.initial_jitter_us))
        } else {
            Duration::ZERO
        };
        self.next = Some(TokioInstant::now() + self.config.period + jitter);
        debug!(fires = self.count, "interval timer started");
    }

    /// Stops the timer. No-op if already stopped.
    pub fn stop(&mut self) {
        if self.next.take().is_some() {
            debug!(fires = self.count, "interval timer stopped");
        }
    }

    /// `true` between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// Waits for the next fire. Pends forever while stopped.
    pub async fn wait(&mut self) -> Fire {
        let Some(deadline) = self.next else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        let period = self.config.period;
        let now = TokioInstant::now();
        let late_by = now.saturating_duration_since(deadline);
        let overrun = late_by > period / 10;
        let behind = (late_by.as_nanos() / period.as_nanos()) as u64;
        let mut skipped = 0;

        self.count += 1;
        self.work_start = Some(Instant::now());

        self.next = Some(match self.config.policy {
            OverrunPolicy::KeepCadence => {
                if overrun {
                    warn!(fire = self.count, late_ms = late_by.as_secs_f64() * 1000.0, "timer overrun, keeping cadence");
                }
                deadline + period
            }
            OverrunPolicy::Resync => {
                if overrun && behind > 0 {
                    skipped = behind;
                    warn!(fire = self.count, skipped, "timer overrun, resyncing");
                }
                now + period
            }
            OverrunPolicy::CatchUp { max_catchup } => {
                if behind <= u64::from(max_catchup) {
                    deadline + period
                } else {
                    skipped = behind - u64::from(max_catchup);
                    warn!(fire = self.count, behind, skipped, "timer overrun beyond catch-up cap");
                    now + period
                }
            }
        });

        if self.config.metrics_enabled {
            self.metrics.total_fires += 1;
            self.metrics.total_skipped += skipped;
            if overrun {
                self.metrics.total_overruns += 1;
            }
        }

        trace!(fire = self.count, overrun, "timer fired");

        Fire {
            count: self.count,
            elapsed: period,
            overrun,
            skipped,
        }
    }

    /// Marks the end of the work done for the latest fire. Feeds budget
    /// warnings and the work-time metrics.
    pub fn record_work_end(&mut self) {
        let Some(start) = self.work_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.period.as_secs_f64();

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                fire = self.count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "timer work approaching period"
            );
        }

        if self.config.metrics_enabled {
            self.metrics.max_work_time = self.metrics.max_work_time.max(elapsed);
            let alpha = 0.1;
            let prev = self.metrics.avg_work_time.as_secs_f64();
            self.metrics.avg_work_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + elapsed.as_secs_f64() * alpha);
        }
    }

    /// Fires since creation.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.config.period
    }

    /// Current metrics.
    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }
}
