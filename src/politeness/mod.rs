//! Politeness controller
//!
//! Every outbound request waits on [`Politeness::acquire`], which spaces grants
//! at least `1 / rate_limit` apart across the whole crawl. Callers report the
//! outcome of each attempt with [`Politeness::report_outcome`]; a transient
//! failure pushes the next grant out by an exponential, jittered delay.
//!
//! Retry control flow is an explicit loop owned by the caller:
//!
//! ```no_run
//! # use lot_harvest::politeness::{Outcome, Politeness, RetryDecision, RetrySequence};
//! # async fn demo(politeness: &Politeness) {
//! let mut retry = RetrySequence::new();
//! loop {
//!     politeness.acquire().await;
//!     let outcome = Outcome::Success; // issue the request here
//!     match politeness.report_outcome(&mut retry, outcome).await {
//!         RetryDecision::RetryAfter(_) => continue,
//!         _ => break,
//!     }
//! }
//! # }
//! ```

mod backoff;

pub use backoff::{Backoff, RetrySequence};

use crate::config::{CrawlerConfig, RetryConfig};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Classification of one request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Timeout, connection error, 429 or 5xx
    TransientFailure,
    /// Any failure that retrying cannot fix
    PermanentFailure,
}

/// What the caller should do after reporting an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Success,
    /// Try again; the next `acquire()` already waits for the delay
    RetryAfter(Duration),
    PermanentFailure,
    /// The attempt budget is spent
    Exhausted { attempts: u32 },
}

#[derive(Debug)]
struct Pacing {
    min_interval: Duration,
    next_grant: Option<Instant>,
}

/// Crawl-wide request pacing and backoff
#[derive(Debug)]
pub struct Politeness {
    backoff: Backoff,
    pacing: Mutex<Pacing>,
}

impl Politeness {
    /// Creates a controller from the crawl and retry configuration
    pub fn new(crawler: &CrawlerConfig, retry: &RetryConfig) -> Self {
        Self::with_interval(
            crawler.min_interval(),
            Backoff::new(retry.base_delay(), retry.max_delay(), retry.max_attempts),
        )
    }

    pub fn with_interval(min_interval: Duration, backoff: Backoff) -> Self {
        Self {
            backoff,
            pacing: Mutex::new(Pacing {
                min_interval,
                next_grant: None,
            }),
        }
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub async fn min_interval(&self) -> Duration {
        self.pacing.lock().await.min_interval
    }

    /// Widens the minimum spacing (e.g. to honour a robots.txt crawl delay)
    ///
    /// Never narrows it below the configured rate.
    pub async fn widen_interval(&self, interval: Duration) {
        let mut pacing = self.pacing.lock().await;
        if interval > pacing.min_interval {
            tracing::info!(
                "Request spacing widened from {:?} to {:?}",
                pacing.min_interval,
                interval
            );
            pacing.min_interval = interval;
        }
    }

    /// Waits until the next request may be issued, then claims the slot
    ///
    /// The lock is held across the sleep so concurrent callers are granted one
    /// at a time, each at least `min_interval` after the previous grant.
    pub async fn acquire(&self) {
        let mut pacing = self.pacing.lock().await;

        if let Some(at) = pacing.next_grant {
            if at > Instant::now() {
                tracing::trace!("Pacing: waiting {:?}", at - Instant::now());
                tokio::time::sleep_until(at).await;
            }
        }

        let granted = Instant::now();
        pacing.next_grant = Some(granted + pacing.min_interval);
    }

    /// Records the outcome of an attempt and decides whether to retry
    ///
    /// # Arguments
    ///
    /// * `retry` - The caller's retry sequence for the request being attempted
    /// * `outcome` - Classification of the attempt that just finished
    ///
    /// # Returns
    ///
    /// The decision for the caller's loop. On `RetryAfter` the next grant has
    /// already been pushed out by the returned delay.
    pub async fn report_outcome(&self, retry: &mut RetrySequence, outcome: Outcome) -> RetryDecision {
        match outcome {
            Outcome::Success => {
                retry.reset();
                RetryDecision::Success
            }
            Outcome::PermanentFailure => {
                retry.reset();
                RetryDecision::PermanentFailure
            }
            Outcome::TransientFailure => {
                let attempts = retry.record_failure();
                if attempts >= self.backoff.max_attempts() {
                    tracing::warn!("Giving up after {} attempts", attempts);
                    retry.reset();
                    return RetryDecision::Exhausted { attempts };
                }

                let delay = self.backoff.delay_for(retry, attempts - 1);
                let mut pacing = self.pacing.lock().await;
                let resume_at = Instant::now() + delay;
                pacing.next_grant = Some(match pacing.next_grant {
                    Some(at) if at > resume_at => at,
                    _ => resume_at,
                });

                tracing::warn!(
                    "Transient failure (attempt {}/{}), backing off {:?}",
                    attempts,
                    self.backoff.max_attempts(),
                    delay
                );
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(rate: f64, max_attempts: u32) -> Politeness {
        Politeness::with_interval(
            Duration::from_secs_f64(1.0 / rate),
            Backoff::new(Duration::from_millis(5), Duration::from_millis(40), max_attempts),
        )
    }

    #[tokio::test]
    async fn test_acquire_spacing_bound() {
        let rate = 20.0;
        let politeness = controller(rate, 5);
        let n = 5;

        let start = Instant::now();
        for _ in 0..n {
            politeness.acquire().await;
        }
        let elapsed = start.elapsed();

        let bound = Duration::from_secs_f64((n - 1) as f64 / rate);
        assert!(elapsed >= bound, "elapsed {:?} < bound {:?}", elapsed, bound);
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let politeness = controller(0.1, 5);
        let start = Instant::now();
        politeness.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_spacing_is_global_across_tasks() {
        let rate = 25.0;
        let politeness = std::sync::Arc::new(controller(rate, 5));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let politeness = politeness.clone();
            handles.push(tokio::spawn(async move {
                politeness.acquire().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let bound = Duration::from_secs_f64(3.0 / rate);
        assert!(start.elapsed() >= bound);
    }

    #[tokio::test]
    async fn test_success_resets_attempts() {
        let politeness = controller(50.0, 5);
        let mut retry = RetrySequence::new();

        let decision = politeness
            .report_outcome(&mut retry, Outcome::TransientFailure)
            .await;
        assert!(matches!(decision, RetryDecision::RetryAfter(_)));
        assert_eq!(retry.attempts(), 1);

        let decision = politeness.report_outcome(&mut retry, Outcome::Success).await;
        assert_eq!(decision, RetryDecision::Success);
        assert_eq!(retry.attempts(), 0);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let politeness = controller(50.0, 5);
        let mut retry = RetrySequence::new();

        let decision = politeness
            .report_outcome(&mut retry, Outcome::PermanentFailure)
            .await;
        assert_eq!(decision, RetryDecision::PermanentFailure);
    }

    #[tokio::test]
    async fn test_exhaustion_after_max_attempts() {
        let politeness = controller(50.0, 3);
        let mut retry = RetrySequence::new();

        let mut decisions = Vec::new();
        for _ in 0..3 {
            decisions.push(
                politeness
                    .report_outcome(&mut retry, Outcome::TransientFailure)
                    .await,
            );
        }

        assert!(matches!(decisions[0], RetryDecision::RetryAfter(_)));
        assert!(matches!(decisions[1], RetryDecision::RetryAfter(_)));
        assert_eq!(decisions[2], RetryDecision::Exhausted { attempts: 3 });
    }

    #[tokio::test]
    async fn test_backoff_delays_next_grant() {
        let politeness = Politeness::with_interval(
            Duration::from_millis(1),
            Backoff::new(Duration::from_millis(60), Duration::from_millis(500), 5),
        );
        let mut retry = RetrySequence::new();

        politeness.acquire().await;
        let decision = politeness
            .report_outcome(&mut retry, Outcome::TransientFailure)
            .await;
        let delay = match decision {
            RetryDecision::RetryAfter(delay) => delay,
            other => panic!("unexpected decision {:?}", other),
        };
        assert!(delay >= Duration::from_millis(60));

        let start = Instant::now();
        politeness.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_widen_interval_never_narrows() {
        let politeness = controller(2.0, 5);
        politeness.widen_interval(Duration::from_millis(100)).await;
        assert_eq!(politeness.min_interval().await, Duration::from_millis(500));

        politeness.widen_interval(Duration::from_secs(3)).await;
        assert_eq!(politeness.min_interval().await, Duration::from_secs(3));
    }
}
