//! Scheduling policies that space out verifier calls.

use std::thread;
use std::time::{Duration, Instant};

/// Gate called right before every external verifier call.
pub trait RateLimiter {
    /// Block until the next call is allowed.
    fn acquire(&mut self);
}

/// No spacing at all. Used in tests and for local verifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn acquire(&mut self) {}
}

/// Guarantees at least `interval` between the starts of consecutive calls.
///
/// The first call goes through immediately. Time already spent between
/// calls (for example waiting on the verifier) counts towards the interval.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    interval: Duration,
    last_call: Option<Instant>,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left before the next call may start.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_call {
            Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

impl RateLimiter for FixedInterval {
    fn acquire(&mut self) {
        let wait = self.remaining(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        self.last_call = Some(Instant::now());
    }
}

impl<R: RateLimiter + ?Sized> RateLimiter for &mut R {
    fn acquire(&mut self) {
        (**self).acquire();
    }
}
