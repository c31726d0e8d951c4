//! Startup retry and the periodic history retention sweep.

use std::{future::Future, sync::Arc, time::Duration};

use rand_core::{OsRng, RngCore};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{info, warn};
use trailguard_core::{retry::RetryPolicy, service::TrackingService, store::TrackingStore};

/// A uniform sample in `[0, 1)` from the OS RNG.
pub fn os_unit() -> f64 {
  f64::from(OsRng.next_u32()) / (f64::from(u32::MAX) + 1.0)
}

/// Run `attempt` until it succeeds or `policy` gives up, sleeping between
/// failures. `unit` supplies the jitter sample for each delay.
pub async fn with_retry<T, E, F, Fut>(
  policy: &RetryPolicy,
  what: &str,
  mut unit: impl FnMut() -> f64,
  mut attempt: F,
) -> Result<T, E>
where
  E: std::fmt::Display,
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let mut n = 1;
  loop {
    match attempt().await {
      Ok(v) => return Ok(v),
      Err(e) if policy.should_retry(n) => {
        let delay = policy.delay(n, unit());
        warn!(attempt = n, ?delay, error = %e, "{what} failed; retrying");
        tokio::time::sleep(delay).await;
        n += 1;
      }
      Err(e) => return Err(e),
    }
  }
}

/// Spawn a task that prunes expired history every `every`.
///
/// The first sweep runs immediately. Failures are logged and the loop keeps
/// going.
pub fn spawn_retention_sweeper<S>(
  service: Arc<TrackingService<S>>,
  every: Duration,
) -> JoinHandle<()>
where
  S: TrackingStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match service.prune_expired().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "retention sweep finished"),
        Err(e) => warn!(error = %e, "retention sweep failed"),
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn fast() -> RetryPolicy {
    RetryPolicy {
      max_attempts: 3,
      base_delay:   Duration::from_millis(1),
      max_delay:    Duration::from_millis(4),
      jitter:       0.5,
    }
  }

  #[tokio::test]
  async fn retries_until_success() {
    let calls = AtomicU32::new(0);
    let out: Result<u32, String> = with_retry(&fast(), "open", || 0.0, || {
      let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
      async move { if n < 3 { Err(format!("busy {n}")) } else { Ok(n) } }
    })
    .await;
    assert_eq!(out, Ok(3));
  }

  #[tokio::test]
  async fn gives_up_after_max_attempts() {
    let calls = AtomicU32::new(0);
    let out: Result<(), String> = with_retry(&fast(), "open", || 0.5, || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err("down".to_string()) }
    })
    .await;
    assert_eq!(out, Err("down".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn os_unit_is_in_range() {
    for _ in 0..100 {
      let u = os_unit();
      assert!((0.0..1.0).contains(&u));
    }
  }
}
