// ── Token bucket ──
//
// Global request ceiling for one client. Capacity regenerates in whole
// quanta on a fixed tick (not continuously), so with the FMC defaults the
// bucket refills completely once per minute.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::Error;

/// Rate limiter policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum tokens the bucket holds.
    pub capacity: u32,
    /// Tokens added on every tick.
    pub quantum: u32,
    /// Time between ticks.
    pub interval: Duration,
}

impl Default for RateLimitConfig {
    /// FMC allows 120 requests per minute per user; stay under it.
    fn default() -> Self {
        Self {
            capacity: 100,
            quantum: 100,
            interval: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// A bucket that refills completely every `interval`.
    pub fn per_interval(capacity: u32, interval: Duration) -> Self {
        Self {
            capacity,
            quantum: capacity,
            interval,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.capacity == 0 || self.quantum == 0 {
            return Err(Error::Config {
                message: "rate limit capacity and quantum must be at least 1".into(),
            });
        }
        if self.interval.is_zero() {
            return Err(Error::Config {
                message: "rate limit interval must be non-zero".into(),
            });
        }
        Ok(())
    }
}

struct BucketState {
    tokens: u32,
    /// Start of the current tick. Advanced in whole intervals so ticks stay
    /// on a fixed grid.
    last_tick: Instant,
}

/// Token bucket shared by every caller of one client.
///
/// Waiters queue on a fair `tokio::sync::Mutex`, so admission is FIFO.
/// The queue head holds the lock while it sleeps until the next tick, so
/// readers of the token count go through `snapshot` instead of queueing.
pub struct TokenBucket {
    config: RateLimitConfig,
    state: Mutex<BucketState>,
    /// Token count as of the last change made under the lock.
    snapshot: AtomicU32,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(config: RateLimitConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_tick: Instant::now(),
            }),
            snapshot: AtomicU32::new(config.capacity),
        })
    }

    /// Block until `n` tokens are available, then debit them.
    ///
    /// Fails immediately if `n` exceeds the bucket capacity, and with
    /// [`Error::Cancelled`] if `cancel` fires while waiting.
    pub async fn acquire(&self, n: u32, cancel: &CancellationToken) -> Result<(), Error> {
        if n > self.config.capacity {
            return Err(Error::Config {
                message: format!(
                    "requested {n} tokens but the bucket only holds {}",
                    self.config.capacity
                ),
            });
        }

        let mut state = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.state.lock() => guard,
        };

        loop {
            let now = Instant::now();
            self.refill(&mut state, now);

            if state.tokens >= n {
                state.tokens -= n;
                self.snapshot.store(state.tokens, Ordering::Relaxed);
                return Ok(());
            }

            let next_tick = state.last_tick + self.config.interval;
            trace!(
                wanted = n,
                available = state.tokens,
                wait_ms = next_tick.saturating_duration_since(now).as_millis(),
                "rate limited, waiting for next refill"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = sleep_until(next_tick) => {}
            }
        }
    }

    /// Tokens currently in the bucket. Never waits.
    ///
    /// While a caller is parked waiting for a refill this reports the count
    /// it last saw, which can lag a refill that is due but not yet applied.
    pub fn available(&self) -> u32 {
        match self.state.try_lock() {
            Ok(mut state) => {
                self.refill(&mut state, Instant::now());
                state.tokens
            }
            Err(_) => self.snapshot.load(Ordering::Relaxed),
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_tick);
        let ticks: u32 = (elapsed.as_nanos() / self.config.interval.as_nanos())
            .try_into()
            .unwrap_or(u32::MAX);
        if ticks == 0 {
            return;
        }

        state.tokens = state
            .tokens
            .saturating_add(ticks.saturating_mul(self.config.quantum))
            .min(self.config.capacity);
        state.last_tick += self.config.interval.checked_mul(ticks).unwrap_or(elapsed);
        self.snapshot.store(state.tokens, Ordering::Relaxed);
    }
}
