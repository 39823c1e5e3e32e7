use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::clock::Clock;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    last_access: Instant,
}

/// Token bucket for a single client.
///
/// Tokens accrue fractionally at `rate` per second up to `burst`; each
/// admitted request spends one whole token. A new bucket starts full.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: u32,
    clock: Arc<dyn Clock>,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(rate: f64, burst: u32, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            rate,
            burst,
            clock,
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                last_refill: now,
                last_access: now,
            }),
        }
    }

    /// Spends one token if available. Never blocks on anything but the bucket's own lock.
    pub fn allow(&self) -> bool {
        self.check().is_ok()
    }

    /// Like [`RateLimiter::allow`], but a denial carries the time until one
    /// whole token is available.
    pub fn check(&self) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, now);
        state.last_access = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            Err(self.wait_for_token(state.tokens))
        }
    }

    /// Time until one whole token is available, zero if one is available now.
    pub fn retry_after(&self) -> Duration {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, now);
        self.wait_for_token(state.tokens)
    }

    pub fn tokens(&self) -> f64 {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, now);
        state.tokens
    }

    pub fn last_access(&self) -> Instant {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_access
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// How long an untouched bucket takes to fill up from empty.
    pub fn time_to_full(&self) -> Duration {
        saturating_secs(f64::from(self.burst) / self.rate)
    }

    fn wait_for_token(&self, tokens: f64) -> Duration {
        let missing = 1.0 - tokens;
        if missing <= 0.0 {
            Duration::ZERO
        } else {
            saturating_secs(missing / self.rate)
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        // A clock that reads earlier than the last refill adds nothing.
        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed.is_zero() {
            return;
        }
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(f64::from(self.burst));
        state.last_refill = now;
    }
}

/// Seconds as a `Duration`, clamped to `Duration::MAX` when out of range.
pub(crate) fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
