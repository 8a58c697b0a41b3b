//! Exponential backoff with jitter for transient-failure retries.
//!
//! Two policies exist in the core, differing only in parameters:
//!
//! - writer pool: `min(base * 2^attempt, 10s) + uniform(0, 500ms)`
//! - upload queue: `min(base * 2^attempt +/- 25%, 30s)`
//!
//! Waits are real `tokio::time::sleep` suspensions; they never busy-loop.

use rand::Rng;
use std::time::Duration;

/// Jitter applied to the exponential delay.
#[derive(Debug, Clone, Copy)]
pub enum Jitter {
    /// Add a uniform random duration in `[0, max)` after capping.
    Additive(Duration),
    /// Scale the delay by a uniform random factor in `[1 - f, 1 + f]`
    /// before capping.
    Proportional(f64),
}

/// Retry schedule for a transient failure class.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay for attempt 0.
    pub base: Duration,
    /// Upper bound on the exponential component.
    pub cap: Duration,
    /// Jitter shape.
    pub jitter: Jitter,
    /// Retry budget; attempts beyond this become permanent failures.
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Default policy for writer pool job retries.
    pub fn writer_pool() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_millis(10_000),
            jitter: Jitter::Additive(Duration::from_millis(500)),
            max_attempts: 3,
        }
    }

    /// Default policy for upload transfer retries.
    pub fn upload() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            cap: Duration::from_millis(30_000),
            jitter: Jitter::Proportional(0.25),
            max_attempts: 5,
        }
    }

    /// The deterministic (non-jittered) delay: doubles each attempt, capped.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.min(31)));
        exp.min(self.cap)
    }

    /// The jittered delay actually slept before resubmitting.
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut rng = rand::rng();
        match self.jitter {
            Jitter::Additive(max) => {
                let jitter = Duration::from_millis(rng.random_range(0..=max.as_millis() as u64));
                self.base_delay(attempt) + jitter
            }
            Jitter::Proportional(fraction) => {
                let exp = self.base.saturating_mul(2u32.saturating_pow(attempt.min(31)));
                let factor = rng.random_range(1.0 - fraction..=1.0 + fraction);
                let jittered = exp.mul_f64(factor.max(0.0));
                jittered.min(self.cap)
            }
        }
    }

    /// Whether another retry is allowed after `attempt` failures.
    pub fn attempts_remaining(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_doubles_until_pool_cap() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(1_000),
            cap: Duration::from_millis(10_000),
            jitter: Jitter::Additive(Duration::from_millis(500)),
            max_attempts: 10,
        };

        assert_eq!(policy.base_delay(0), Duration::from_millis(1_000));
        assert_eq!(policy.base_delay(1), Duration::from_millis(2_000));
        assert_eq!(policy.base_delay(2), Duration::from_millis(4_000));
        assert_eq!(policy.base_delay(3), Duration::from_millis(8_000));
        assert_eq!(policy.base_delay(4), Duration::from_millis(10_000));
        assert_eq!(policy.base_delay(20), Duration::from_millis(10_000));
    }

    #[test]
    fn test_base_delay_doubles_until_upload_cap() {
        let policy = BackoffPolicy::upload();

        assert_eq!(policy.base_delay(0), Duration::from_millis(1_000));
        assert_eq!(policy.base_delay(1), Duration::from_millis(2_000));
        assert_eq!(policy.base_delay(2), Duration::from_millis(4_000));
        assert_eq!(policy.base_delay(3), Duration::from_millis(8_000));
        assert_eq!(policy.base_delay(4), Duration::from_millis(16_000));
        assert_eq!(policy.base_delay(5), Duration::from_millis(30_000));
        assert_eq!(policy.base_delay(31), Duration::from_millis(30_000));
    }

    #[test]
    fn test_additive_jitter_bounds() {
        let policy = BackoffPolicy::writer_pool();
        for attempt in 0..6 {
            let base = policy.base_delay(attempt);
            for _ in 0..50 {
                let delay = policy.delay(attempt);
                assert!(delay >= base);
                assert!(delay <= base + Duration::from_millis(500));
            }
        }
    }

    #[test]
    fn test_proportional_jitter_bounds() {
        let policy = BackoffPolicy::upload();
        for attempt in 0..4 {
            let exp = policy.base_delay(attempt);
            for _ in 0..50 {
                let delay = policy.delay(attempt);
                assert!(delay >= exp.mul_f64(0.75));
                assert!(delay <= exp.mul_f64(1.25).min(policy.cap));
            }
        }
    }

    #[test]
    fn test_proportional_jitter_respects_cap() {
        let policy = BackoffPolicy::upload();
        for _ in 0..50 {
            assert!(policy.delay(10) <= Duration::from_millis(30_000));
        }
    }

    #[test]
    fn test_attempts_remaining() {
        let policy = BackoffPolicy::writer_pool();
        assert!(policy.attempts_remaining(0));
        assert!(policy.attempts_remaining(2));
        assert!(!policy.attempts_remaining(3));
        assert!(!policy.attempts_remaining(4));
    }
}
