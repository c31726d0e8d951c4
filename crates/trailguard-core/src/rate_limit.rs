//! Per-tourist minimum interval between accepted samples.

use std::{
  collections::HashMap,
  sync::Mutex,
  time::{Duration, Instant},
};

/// Tracks when each tourist last had a sample accepted.
///
/// A slot is reserved by [`try_acquire`](Self::try_acquire) before the store
/// write and handed back with [`release`](Self::release) if the write fails,
/// so two concurrent samples for one tourist cannot both pass.
#[derive(Debug)]
pub struct RateLimiter {
  min_interval: Duration,
  last:         Mutex<HashMap<String, Instant>>,
}

/// Proof of a reserved slot; pass back to `release` to undo it.
#[derive(Debug)]
#[must_use]
pub struct Permit {
  key:      String,
  stamp:    Instant,
  previous: Option<Instant>,
}

impl RateLimiter {
  pub fn new(min_interval: Duration) -> Self {
    Self { min_interval, last: Mutex::new(HashMap::new()) }
  }

  pub fn min_interval(&self) -> Duration { self.min_interval }

  /// Reserve a slot for `key` at `now`, or return how long to wait.
  pub fn try_acquire(&self, key: &str, now: Instant) -> Result<Permit, Duration> {
    let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
    let previous = last.get(key).copied();

    if let Some(prev) = previous {
      let elapsed = now.saturating_duration_since(prev);
      if elapsed < self.min_interval {
        return Err(self.min_interval - elapsed);
      }
    }

    last.insert(key.to_owned(), now);
    Ok(Permit { key: key.to_owned(), stamp: now, previous })
  }

  /// Undo a reservation whose write did not happen. A newer reservation made
  /// in the meantime is left untouched.
  pub fn release(&self, permit: Permit) {
    let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
    if last.get(&permit.key) != Some(&permit.stamp) {
      return;
    }
    match permit.previous {
      Some(prev) => {
        last.insert(permit.key, prev);
      }
      None => {
        last.remove(&permit.key);
      }
    }
  }

  /// Drop all state for `key`, e.g. once its card is returned.
  pub fn forget(&self, key: &str) {
    self
      .last
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .remove(key);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn second_sample_inside_interval_is_rejected() {
    let rl = RateLimiter::new(Duration::from_secs(5));
    let t0 = Instant::now();

    let _p = rl.try_acquire("A", t0).unwrap();
    let wait = rl.try_acquire("A", t0 + Duration::from_secs(2)).unwrap_err();
    assert_eq!(wait, Duration::from_secs(3));

    assert!(rl.try_acquire("A", t0 + Duration::from_secs(5)).is_ok());
  }

  #[test]
  fn tourists_are_independent() {
    let rl = RateLimiter::new(Duration::from_secs(5));
    let t0 = Instant::now();
    let _a = rl.try_acquire("A", t0).unwrap();
    assert!(rl.try_acquire("B", t0).is_ok());
  }

  #[test]
  fn release_restores_previous_slot() {
    let rl = RateLimiter::new(Duration::from_secs(5));
    let t0 = Instant::now();

    let _first = rl.try_acquire("A", t0).unwrap();
    let second = rl.try_acquire("A", t0 + Duration::from_secs(6)).unwrap();
    rl.release(second);

    // Back to t0, so t0+6 is allowed again but t0+3 is not.
    assert!(rl.try_acquire("A", t0 + Duration::from_secs(3)).is_err());
    assert!(rl.try_acquire("A", t0 + Duration::from_secs(6)).is_ok());
  }

  #[test]
  fn release_of_first_slot_forgets_key() {
    let rl = RateLimiter::new(Duration::from_secs(5));
    let t0 = Instant::now();
    let p = rl.try_acquire("A", t0).unwrap();
    rl.release(p);
    assert!(rl.try_acquire("A", t0).is_ok());
  }

  #[test]
  fn zero_interval_never_limits() {
    let rl = RateLimiter::new(Duration::ZERO);
    let t0 = Instant::now();
    let _a = rl.try_acquire("A", t0).unwrap();
    assert!(rl.try_acquire("A", t0).is_ok());
  }
}
