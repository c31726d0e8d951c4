//! A cancellable feed of location fixes, standing in for a device's
//! position watch.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tokio::{sync::mpsc, task::JoinHandle};
use trailguard_core::location::{LocationSample, LocationSource};

/// One recorded fix in a replay track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
  pub latitude:  f64,
  pub longitude: f64,
  pub accuracy:  Option<f64>,
}

/// Parse a track file: one `lat,lng[,accuracy]` per line. Blank lines and
/// lines starting with `#` are skipped.
pub fn parse_track(text: &str) -> Result<Vec<TrackPoint>> {
  let mut points = Vec::new();
  for (i, line) in text.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let num = |idx: usize, name: &str| -> Result<f64> {
      fields[idx]
        .parse()
        .with_context(|| format!("line {}: bad {name} {:?}", i + 1, fields[idx]))
    };
    let accuracy = match fields.len() {
      2 => None,
      3 => Some(num(2, "accuracy")?),
      n => bail!("line {}: expected 2 or 3 fields, got {n}", i + 1),
    };
    points.push(TrackPoint {
      latitude: num(0, "latitude")?,
      longitude: num(1, "longitude")?,
      accuracy,
    });
  }
  Ok(points)
}

/// Yields samples from a background producer over a bounded channel.
///
/// The producer is aborted by [`stop`](Self::stop) or when the subscription
/// is dropped. A slow consumer applies backpressure instead of buffering
/// without bound.
pub struct LocationSubscription {
  rx:      mpsc::Receiver<LocationSample>,
  task:    JoinHandle<()>,
  stopped: bool,
}

impl LocationSubscription {
  /// Emit `track` one point per `interval`, stamping each sample with the
  /// time it is emitted.
  pub fn replay(track: Vec<TrackPoint>, interval: Duration, capacity: usize) -> Self {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      for point in track {
        ticker.tick().await;
        let sample = LocationSample {
          accuracy: point.accuracy,
          source: LocationSource::Gps,
          ..LocationSample::at(point.latitude, point.longitude).recorded(Utc::now())
        };
        if tx.send(sample).await.is_err() {
          break;
        }
      }
    });
    Self { rx, task, stopped: false }
  }

  /// The next sample, or `None` once the track is exhausted or the
  /// subscription was stopped.
  pub async fn next(&mut self) -> Option<LocationSample> {
    if self.stopped {
      return None;
    }
    self.rx.recv().await
  }

  /// Stop the producer. Samples still buffered are discarded.
  pub fn stop(&mut self) {
    self.stopped = true;
    self.task.abort();
    self.rx.close();
  }

  pub fn is_stopped(&self) -> bool { self.stopped }
}

impl Drop for LocationSubscription {
  fn drop(&mut self) { self.task.abort(); }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn track(n: usize) -> Vec<TrackPoint> {
    (0..n)
      .map(|i| TrackPoint { latitude: i as f64, longitude: 0.0, accuracy: None })
      .collect()
  }

  #[test]
  fn parses_track_lines() {
    let text = "# morning walk\n27.17,78.04\n\n27.18, 78.05, 12.5\n";
    let points = parse_track(text).unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0], TrackPoint { latitude: 27.17, longitude: 78.04, accuracy: None });
    assert_eq!(points[1].accuracy, Some(12.5));
  }

  #[test]
  fn rejects_bad_lines() {
    assert!(parse_track("27.1").is_err());
    assert!(parse_track("north,78.0").is_err());
    assert!(parse_track("1,2,3,4").is_err());
  }

  #[tokio::test]
  async fn replays_in_order_then_ends() {
    let mut sub = LocationSubscription::replay(track(3), Duration::from_millis(1), 1);
    let mut seen = Vec::new();
    while let Some(s) = sub.next().await {
      assert!(s.recorded_at.is_some());
      seen.push(s.latitude);
    }
    assert_eq!(seen, vec![0.0, 1.0, 2.0]);
  }

  #[tokio::test]
  async fn stop_ends_the_stream() {
    let mut sub = LocationSubscription::replay(track(1_000), Duration::from_millis(1), 4);
    assert!(sub.next().await.is_some());
    sub.stop();
    assert!(sub.is_stopped());
    assert!(sub.next().await.is_none());
  }
}
