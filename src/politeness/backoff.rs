use rand::Rng;
use std::time::Duration;

/// Exponential backoff policy with additive jitter
///
/// The delay after the `n`th consecutive transient failure (0-based) is
/// `min(base * 2^n + jitter, cap)` with `jitter` uniform in `[0, base)`.
/// The jitter goes in before the cap, not on top of it as in the usual
/// `min(base * 2^n, cap) + jitter`: the cap is a hard ceiling, and once it is
/// reached the delay stays there instead of jumping around below it. Delays
/// within one [`RetrySequence`] never decrease.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

/// Attempt bookkeeping for one logical request
#[derive(Debug, Clone, Default)]
pub struct RetrySequence {
    attempts: u32,
    last_delay: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap: cap.max(base),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Total attempts allowed per request, the first one included
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Deterministic part of the delay for the given attempt
    pub fn floor(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.cap)
    }

    /// Computes the delay for `attempt` and records it on the sequence
    pub fn delay_for(&self, retry: &mut RetrySequence, attempt: u32) -> Duration {
        let raw = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt))
            .saturating_add(self.jitter());
        let delay = raw.min(self.cap).max(retry.last_delay);
        retry.last_delay = delay;
        delay
    }

    fn jitter(&self) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        if base_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..base_ms))
    }
}

impl RetrySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of consecutive failed attempts so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_delay(&self) -> Duration {
        self.last_delay
    }

    pub(crate) fn record_failure(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
        self.last_delay = Duration::ZERO;
    }
}
