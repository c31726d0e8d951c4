//! Explicit retry/backoff policy for connecting to storage.

use std::time::Duration;

/// Exponential backoff with bounded jitter.
///
/// The policy itself is deterministic; the caller supplies the random
/// component so it can be driven from any RNG (or a constant in tests).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
  /// Total attempts including the first one. Zero is treated as one.
  pub max_attempts: u32,
  pub base_delay:   Duration,
  pub max_delay:    Duration,
  /// Fraction of the computed delay added as random jitter, in `[0, 1]`.
  pub jitter:       f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      base_delay:   Duration::from_secs(1),
      max_delay:    Duration::from_secs(30),
      jitter:       0.2,
    }
  }
}

impl RetryPolicy {
  /// Whether another attempt is allowed after `attempt` (1-based) failed.
  pub fn should_retry(&self, attempt: u32) -> bool {
    attempt < self.max_attempts.max(1)
  }

  /// Delay to wait after failed attempt number `attempt` (1-based).
  /// `unit` is a uniform random sample in `[0, 1)`.
  pub fn delay(&self, attempt: u32, unit: f64) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    let backoff = self
      .base_delay
      .saturating_mul(1u32 << exp)
      .min(self.max_delay);
    let jitter = backoff.mul_f64(self.jitter.clamp(0.0, 1.0) * unit.clamp(0.0, 1.0));
    (backoff + jitter).min(self.max_delay)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn policy() -> RetryPolicy {
    RetryPolicy {
      max_attempts: 4,
      base_delay:   Duration::from_millis(100),
      max_delay:    Duration::from_millis(1_000),
      jitter:       0.5,
    }
  }

  #[test]
  fn delays_double_until_capped() {
    let p = policy();
    assert_eq!(p.delay(1, 0.0), Duration::from_millis(100));
    assert_eq!(p.delay(2, 0.0), Duration::from_millis(200));
    assert_eq!(p.delay(3, 0.0), Duration::from_millis(400));
    assert_eq!(p.delay(5, 0.0), Duration::from_millis(1_000));
    assert_eq!(p.delay(40, 0.0), Duration::from_millis(1_000));
  }

  #[test]
  fn jitter_is_bounded() {
    let p = policy();
    assert_eq!(p.delay(1, 0.5), Duration::from_millis(125));
    assert!(p.delay(1, 0.999) < Duration::from_millis(150));
    assert_eq!(p.delay(4, 0.9), Duration::from_millis(1_000));
  }

  #[test]
  fn attempts_are_counted_from_one() {
    let p = policy();
    assert!(p.should_retry(1));
    assert!(p.should_retry(3));
    assert!(!p.should_retry(4));

    let once = RetryPolicy { max_attempts: 0, ..p };
    assert!(!once.should_retry(1));
  }
}
