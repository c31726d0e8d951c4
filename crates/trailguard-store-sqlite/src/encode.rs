//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are RFC 3339 with nine fractional digits. Enums are stored by
//! their lowercase names. `TouristInfo` is stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use trailguard_core::{
  lifecycle::{AlertKind, TrackingAlert},
  location::{HistoryEntry, LocationSource},
  tourist::{CurrentLocation, TouristInfo, TouristStatus, TrackedTourist},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

fn decode_enum<T: std::str::FromStr>(what: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

pub fn decode_status(s: &str) -> Result<TouristStatus> { decode_enum("status", s) }

pub fn encode_tourist_info(info: &TouristInfo) -> Result<String> {
  Ok(serde_json::to_string(info)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawTourist::from_row`].
pub const TOURIST_COLUMNS: &str = "visit_id, blockchain_id, phone_number, tourist_info, status,
  current_latitude, current_longitude, current_accuracy, current_speed,
  current_heading, current_recorded_at, issued_at, returned_at, last_updated,
  version";

/// Raw values read directly from a `tracked_tourists` row.
pub struct RawTourist {
  pub visit_id:            String,
  pub blockchain_id:       String,
  pub phone_number:        String,
  pub tourist_info:        String,
  pub status:              String,
  pub current_latitude:    f64,
  pub current_longitude:   f64,
  pub current_accuracy:    Option<f64>,
  pub current_speed:       Option<f64>,
  pub current_heading:     Option<f64>,
  pub current_recorded_at: String,
  pub issued_at:           String,
  pub returned_at:         Option<String>,
  pub last_updated:        String,
  pub version:             i64,
}

impl RawTourist {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      visit_id:            row.get(0)?,
      blockchain_id:       row.get(1)?,
      phone_number:        row.get(2)?,
      tourist_info:        row.get(3)?,
      status:              row.get(4)?,
      current_latitude:    row.get(5)?,
      current_longitude:   row.get(6)?,
      current_accuracy:    row.get(7)?,
      current_speed:       row.get(8)?,
      current_heading:     row.get(9)?,
      current_recorded_at: row.get(10)?,
      issued_at:           row.get(11)?,
      returned_at:         row.get(12)?,
      last_updated:        row.get(13)?,
      version:             row.get(14)?,
    })
  }

  pub fn is_returned(&self) -> bool {
    self.status == TouristStatus::Returned.as_ref()
  }

  pub fn into_tourist(self) -> Result<TrackedTourist> {
    Ok(TrackedTourist {
      visit_id:         decode_uuid(&self.visit_id)?,
      blockchain_id:    self.blockchain_id,
      phone_number:     self.phone_number,
      tourist_info:     serde_json::from_str(&self.tourist_info)?,
      status:           decode_status(&self.status)?,
      current_location: CurrentLocation {
        latitude:    self.current_latitude,
        longitude:   self.current_longitude,
        accuracy:    self.current_accuracy,
        speed:       self.current_speed,
        heading:     self.current_heading,
        recorded_at: decode_dt(&self.current_recorded_at)?,
      },
      issued_at:        decode_dt(&self.issued_at)?,
      returned_at:      self.returned_at.as_deref().map(decode_dt).transpose()?,
      last_updated:     decode_dt(&self.last_updated)?,
      version:          u64::try_from(self.version)
        .map_err(|_| Error::Decode(format!("negative version {}", self.version)))?,
    })
  }
}

/// Column list matching [`RawHistoryEntry::from_row`].
pub const HISTORY_COLUMNS: &str = "entry_id, visit_id, blockchain_id, latitude, longitude,
  accuracy, speed, heading, altitude, source, recorded_at, received_at,
  out_of_order";

pub struct RawHistoryEntry {
  pub entry_id:      String,
  pub visit_id:      String,
  pub blockchain_id: String,
  pub latitude:      f64,
  pub longitude:     f64,
  pub accuracy:      Option<f64>,
  pub speed:         Option<f64>,
  pub heading:       Option<f64>,
  pub altitude:      Option<f64>,
  pub source:        String,
  pub recorded_at:   String,
  pub received_at:   String,
  pub out_of_order:  bool,
}

impl RawHistoryEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:      row.get(0)?,
      visit_id:      row.get(1)?,
      blockchain_id: row.get(2)?,
      latitude:      row.get(3)?,
      longitude:     row.get(4)?,
      accuracy:      row.get(5)?,
      speed:         row.get(6)?,
      heading:       row.get(7)?,
      altitude:      row.get(8)?,
      source:        row.get(9)?,
      recorded_at:   row.get(10)?,
      received_at:   row.get(11)?,
      out_of_order:  row.get(12)?,
    })
  }

  pub fn into_entry(self) -> Result<HistoryEntry> {
    Ok(HistoryEntry {
      entry_id:      decode_uuid(&self.entry_id)?,
      visit_id:      decode_uuid(&self.visit_id)?,
      blockchain_id: self.blockchain_id,
      latitude:      self.latitude,
      longitude:     self.longitude,
      accuracy:      self.accuracy,
      speed:         self.speed,
      heading:       self.heading,
      altitude:      self.altitude,
      source:        decode_enum::<LocationSource>("location source", &self.source)?,
      recorded_at:   decode_dt(&self.recorded_at)?,
      received_at:   decode_dt(&self.received_at)?,
      out_of_order:  self.out_of_order,
    })
  }
}

/// Column list matching [`RawAlert::from_row`].
pub const ALERT_COLUMNS: &str =
  "alert_id, visit_id, blockchain_id, kind, message, raised_at, resolved, resolved_by, resolved_at";

pub struct RawAlert {
  pub alert_id:      String,
  pub visit_id:      String,
  pub blockchain_id: String,
  pub kind:          String,
  pub message:       String,
  pub raised_at:     String,
  pub resolved:      bool,
  pub resolved_by:   Option<String>,
  pub resolved_at:   Option<String>,
}

impl RawAlert {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      alert_id:      row.get(0)?,
      visit_id:      row.get(1)?,
      blockchain_id: row.get(2)?,
      kind:          row.get(3)?,
      message:       row.get(4)?,
      raised_at:     row.get(5)?,
      resolved:      row.get(6)?,
      resolved_by:   row.get(7)?,
      resolved_at:   row.get(8)?,
    })
  }

  pub fn into_alert(self) -> Result<TrackingAlert> {
    Ok(TrackingAlert {
      alert_id:      decode_uuid(&self.alert_id)?,
      visit_id:      decode_uuid(&self.visit_id)?,
      blockchain_id: self.blockchain_id,
      kind:          decode_enum::<AlertKind>("alert kind", &self.kind)?,
      message:       self.message,
      raised_at:     decode_dt(&self.raised_at)?,
      resolved:      self.resolved,
      resolved_by:   self.resolved_by,
      resolved_at:   self.resolved_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexicographically() {
    let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let late = early + chrono::TimeDelta::nanoseconds(1_500);
    let (a, b) = (encode_dt(early), encode_dt(late));
    assert_eq!(a.len(), b.len());
    assert!(a < b, "{a} !< {b}");
    assert_eq!(decode_dt(&b).unwrap(), late);
  }

  #[test]
  fn unknown_enum_values_are_decode_errors() {
    assert!(matches!(decode_status("lost"), Err(Error::Decode(_))));
    assert_eq!(decode_status("emergency").unwrap(), TouristStatus::Emergency);
  }
}
