//! Tracked tourists: one record per visit, keyed by blockchain ID.
//!
//! A blockchain ID may be linked again after its card is returned; each link
//! creates a new visit. At most one non-returned visit exists per ID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state of a visit. `Returned` is terminal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TouristStatus {
  #[default]
  Active,
  Suspicious,
  Emergency,
  Returned,
}

impl TouristStatus {
  /// Whether the card is still out, i.e. any state other than `Returned`.
  pub fn is_live(self) -> bool { !matches!(self, Self::Returned) }
}

// ─── Descriptive info ────────────────────────────────────────────────────────

/// Informational details captured at link time. Never used for decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouristInfo {
  pub name:              Option<String>,
  pub email:             Option<String>,
  pub nationality:       Option<String>,
  pub emergency_contact: Option<String>,
}

// ─── Location ────────────────────────────────────────────────────────────────

/// A bare coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub latitude:  f64,
  pub longitude: f64,
}

/// The latest applied sample for a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentLocation {
  pub latitude:    f64,
  pub longitude:   f64,
  /// Horizontal accuracy in metres.
  pub accuracy:    Option<f64>,
  /// Metres per second.
  pub speed:       Option<f64>,
  /// Degrees clockwise from true north.
  pub heading:     Option<f64>,
  pub recorded_at: DateTime<Utc>,
}

impl CurrentLocation {
  pub fn point(&self) -> GeoPoint {
    GeoPoint { latitude: self.latitude, longitude: self.longitude }
  }
}

// ─── TrackedTourist ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedTourist {
  pub visit_id:         Uuid,
  pub blockchain_id:    String,
  pub phone_number:     String,
  pub tourist_info:     TouristInfo,
  pub status:           TouristStatus,
  pub current_location: CurrentLocation,
  pub issued_at:        DateTime<Utc>,
  pub returned_at:      Option<DateTime<Utc>>,
  /// Arrival time of the latest accepted write.
  pub last_updated:     DateTime<Utc>,
  /// Bumped by every status change; guards optimistic updates.
  pub version:          u64,
}

/// Input to [`crate::service::TrackingService::link`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLink {
  pub blockchain_id:    String,
  pub phone_number:     String,
  #[serde(default)]
  pub tourist_info:     TouristInfo,
  pub initial_location: GeoPoint,
}
