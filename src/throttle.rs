use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

/// Time source for the rate limiter. Swapped for [`ManualClock`] in tests.
#[async_trait]
pub trait Clock: fmt::Debug + Send + Sync {
    /// Wall-clock time since the Unix epoch.
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately, advancing time and recording the duration.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockState>>,
}

#[derive(Debug, Default)]
struct ManualClockState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn starting_at(now: Duration) -> Self {
        let clock = Self::default();
        clock.lock().now = now;
        clock
    }

    pub fn advance(&self, by: Duration) {
        self.lock().now += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.now += duration;
        state.sleeps.push(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub min_interval: Duration,
    /// Reserved per request regardless of actual usage.
    pub tokens_per_request: u32,
    pub tokens_per_window: u32,
    pub window: Duration,
}

impl RateLimits {
    pub const DEFAULT: Self = Self {
        min_interval: Duration::from_secs(1),
        tokens_per_request: 3000,
        tokens_per_window: 150_000,
        window: Duration::from_secs(60),
    };
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateState {
    pub last_request_at: Option<Duration>,
    pub tokens_used: u32,
}

/// Request spacing and per-window token budget shared by every model call in a run.
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    state: RateState,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits, clock: Arc<dyn Clock>) -> Self {
        Self::with_state(limits, clock, RateState::default())
    }

    pub fn with_state(limits: RateLimits, clock: Arc<dyn Clock>, state: RateState) -> Self {
        Self {
            limits,
            state,
            clock,
        }
    }

    pub fn state(&self) -> RateState {
        self.state
    }

    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Blocks until a request may be sent.
    ///
    /// Keeps at least `min_interval` since the last successful request, then, if
    /// another reservation would overflow the budget, sleeps to the next
    /// wall-clock window boundary and resets the counter.
    pub async fn wait_for_slot(&mut self) {
        if let Some(last) = self.state.last_request_at {
            let elapsed = self.clock.now().saturating_sub(last);
            if elapsed < self.limits.min_interval {
                let wait = self.limits.min_interval - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "spacing model requests");
                self.clock.sleep(wait).await;
            }
        }

        let reserved = self
            .state
            .tokens_used
            .saturating_add(self.limits.tokens_per_request);
        if reserved > self.limits.tokens_per_window {
            let wait = until_next_window(self.clock.now(), self.limits.window);
            tracing::debug!(
                tokens_used = self.state.tokens_used,
                budget = self.limits.tokens_per_window,
                wait_ms = wait.as_millis() as u64,
                "token budget exhausted; waiting for next window"
            );
            self.clock.sleep(wait).await;
            self.state.tokens_used = 0;
        }
    }

    pub fn record_request(&mut self) {
        self.state.last_request_at = Some(self.clock.now());
        self.state.tokens_used = self
            .state
            .tokens_used
            .saturating_add(self.limits.tokens_per_request);
    }
}

fn until_next_window(now: Duration, window: Duration) -> Duration {
    let window_nanos = window.as_nanos().max(1);
    let remaining = window_nanos - now.as_nanos() % window_nanos;
    Duration::from_nanos(u64::try_from(remaining).unwrap_or(u64::MAX))
}
