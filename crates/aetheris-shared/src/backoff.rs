//! Capped exponential backoff with jitter, shared by the Broker Adapter's
//! reconnect loop, the agent's reconnect loop, and the Time-Series Writer's
//! transient write retries (§4.A, §4.B, §4.D).

use rand::Rng;
use std::time::Duration;

/// Backoff parameters. Defaults match §4.A: initial 1s, cap 120s, ±20%
/// jitter.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub cap: Duration,
    pub jitter_fraction: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(120),
            jitter_fraction: 0.20,
        }
    }
}

/// Stateful backoff sequence. Call `next()` to get the delay for the next
/// attempt, `reset()` on success.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Returns the delay to wait before the next attempt, and advances the
    /// internal attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let base_secs = self.config.initial.as_secs_f64() * 2f64.powi(self.attempt as i32);
        let capped_secs = base_secs.min(self.config.cap.as_secs_f64());
        self.attempt = self.attempt.saturating_add(1);

        let jitter_range = capped_secs * self.config.jitter_fraction;
        let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
        let jittered = (capped_secs + jitter).max(0.0);
        Duration::from_secs_f64(jittered)
    }

    /// Resets the sequence after a successful operation.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

/// A bounded retry budget for transient operations (§4.D, §7): retries up to
/// `max_attempts` times with backoff delays between them, then gives up.
pub struct RetryBudget {
    pub max_attempts: u32,
    backoff: Backoff,
    attempts_used: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, config: BackoffConfig) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::new(config),
            attempts_used: 0,
        }
    }

    /// Returns `Some(delay)` to wait before the next attempt, or `None` if
    /// the budget has been exhausted.
    pub fn next_delay(&mut self) -> Option<std::time::Duration> {
        if self.attempts_used >= self.max_attempts {
            return None;
        }
        self.attempts_used += 1;
        Some(self.backoff.next_delay())
    }

    pub fn exhausted(&self) -> bool {
        self.attempts_used >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(4),
            jitter_fraction: 0.0,
        });
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        // Should stay capped at 4s, not keep doubling to 8s.
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(120),
            jitter_fraction: 0.0,
        });
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial: Duration::from_secs(10),
            cap: Duration::from_secs(10),
            jitter_fraction: 0.20,
        });
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay.as_secs_f64() >= 8.0 && delay.as_secs_f64() <= 12.0);
        }
    }

    #[test]
    fn retry_budget_exhausts() {
        let mut budget = RetryBudget::new(3, BackoffConfig::default());
        assert!(budget.next_delay().is_some());
        assert!(budget.next_delay().is_some());
        assert!(budget.next_delay().is_some());
        assert!(budget.next_delay().is_none());
        assert!(budget.exhausted());
    }
}
