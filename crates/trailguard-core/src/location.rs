//! Location samples and the append-only history they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::tourist::{CurrentLocation, GeoPoint};

/// Where a sample came from.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LocationSource {
  #[default]
  Gps,
  Network,
  /// Entered by an officer, e.g. the initial location at link time.
  Manual,
}

// ─── Samples ─────────────────────────────────────────────────────────────────

/// A location reported by a device, as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
  pub latitude:    f64,
  pub longitude:   f64,
  pub accuracy:    Option<f64>,
  pub speed:       Option<f64>,
  pub heading:     Option<f64>,
  pub altitude:    Option<f64>,
  /// Device timestamp; the server arrival time is used when absent.
  pub recorded_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub source:      LocationSource,
}

impl LocationSample {
  /// A GPS sample with no optional metadata.
  pub fn at(latitude: f64, longitude: f64) -> Self {
    Self {
      latitude,
      longitude,
      accuracy: None,
      speed: None,
      heading: None,
      altitude: None,
      recorded_at: None,
      source: LocationSource::default(),
    }
  }

  pub fn recorded(mut self, at: DateTime<Utc>) -> Self {
    self.recorded_at = Some(at);
    self
  }

  pub fn point(&self) -> GeoPoint {
    GeoPoint { latitude: self.latitude, longitude: self.longitude }
  }
}

/// A validated sample with both timestamps resolved, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
  pub blockchain_id: String,
  pub latitude:      f64,
  pub longitude:     f64,
  pub accuracy:      Option<f64>,
  pub speed:         Option<f64>,
  pub heading:       Option<f64>,
  pub altitude:      Option<f64>,
  pub source:        LocationSource,
  pub recorded_at:   DateTime<Utc>,
  pub received_at:   DateTime<Utc>,
}

impl NewLocation {
  pub fn from_sample(
    blockchain_id: String,
    sample: LocationSample,
    received_at: DateTime<Utc>,
  ) -> Self {
    Self {
      blockchain_id,
      latitude: sample.latitude,
      longitude: sample.longitude,
      accuracy: sample.accuracy,
      speed: sample.speed,
      heading: sample.heading,
      altitude: sample.altitude,
      source: sample.source,
      recorded_at: sample.recorded_at.unwrap_or(received_at),
      received_at,
    }
  }

  /// The history row for this sample. `out_of_order` starts false; the
  /// store settles it against the current location.
  pub fn into_entry(self, entry_id: Uuid, visit_id: Uuid) -> HistoryEntry {
    HistoryEntry {
      entry_id,
      visit_id,
      blockchain_id: self.blockchain_id,
      latitude: self.latitude,
      longitude: self.longitude,
      accuracy: self.accuracy,
      speed: self.speed,
      heading: self.heading,
      altitude: self.altitude,
      source: self.source,
      recorded_at: self.recorded_at,
      received_at: self.received_at,
      out_of_order: false,
    }
  }

  pub fn as_current(&self) -> CurrentLocation {
    CurrentLocation {
      latitude:    self.latitude,
      longitude:   self.longitude,
      accuracy:    self.accuracy,
      speed:       self.speed,
      heading:     self.heading,
      recorded_at: self.recorded_at,
    }
  }
}

// ─── History ─────────────────────────────────────────────────────────────────

/// One immutable history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub entry_id:      Uuid,
  pub visit_id:      Uuid,
  pub blockchain_id: String,
  pub latitude:      f64,
  pub longitude:     f64,
  pub accuracy:      Option<f64>,
  pub speed:         Option<f64>,
  pub heading:       Option<f64>,
  pub altitude:      Option<f64>,
  pub source:        LocationSource,
  pub recorded_at:   DateTime<Utc>,
  pub received_at:   DateTime<Utc>,
  /// Set when the sample was older than the visit's current location at
  /// the time it arrived. Such samples never replace the current location.
  pub out_of_order:  bool,
}

impl HistoryEntry {
  pub fn cursor(&self) -> HistoryCursor {
    HistoryCursor { recorded_at: self.recorded_at, entry_id: self.entry_id }
  }
}

/// Keyset position in a newest-first history listing. Pages resume strictly
/// after this entry, so concurrent inserts never shift the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCursor {
  pub recorded_at: DateTime<Utc>,
  pub entry_id:    Uuid,
}

/// Parameters for [`crate::store::TrackingStore::history`].
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
  pub limit:  usize,
  pub before: Option<HistoryCursor>,
  /// Inclusive lower bound on `recorded_at`.
  pub since:  Option<DateTime<Utc>>,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationOutcome {
  pub entry:            HistoryEntry,
  /// The visit's current location after the write.
  pub current_location: CurrentLocation,
}

impl LocationOutcome {
  /// Whether this sample became the current location.
  pub fn applied(&self) -> bool { !self.entry.out_of_order }
}
