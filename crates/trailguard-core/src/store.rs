//! The `TrackingStore` trait: Link Registry and Location Store in one
//! storage abstraction.
//!
//! Implemented by storage backends (e.g. `trailguard-store-sqlite`). The
//! service depends on this trait only.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  geo::BoundingBox,
  lifecycle::{AlertQuery, StatusChange, TrackingAlert},
  location::{HistoryEntry, HistoryQuery, LocationOutcome, NewLocation},
  tourist::{TouristStatus, TrackedTourist},
};

/// Abstraction over a Trailguard storage backend.
///
/// Every write is a single atomic unit: either all of its rows persist or
/// none do. Backend errors convert into the core [`crate::Error`] taxonomy.
pub trait TrackingStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Link registry ─────────────────────────────────────────────────────

  /// Persist a freshly linked visit together with its initial history row.
  ///
  /// Fails with a conflict if a non-returned visit already exists for the
  /// same blockchain ID.
  fn insert_link(
    &self,
    tourist: TrackedTourist,
    initial: HistoryEntry,
  ) -> impl Future<Output = Result<TrackedTourist, Self::Error>> + Send + '_;

  /// The most recent visit for `blockchain_id`, returned or not.
  fn latest_visit(
    &self,
    blockchain_id: String,
  ) -> impl Future<Output = Result<Option<TrackedTourist>, Self::Error>> + Send + '_;

  /// All non-returned visits, most recently updated first, optionally
  /// restricted to one status.
  fn list_live(
    &self,
    status: Option<TouristStatus>,
  ) -> impl Future<Output = Result<Vec<TrackedTourist>, Self::Error>> + Send + '_;

  /// Apply a decided status change if the visit is still at
  /// `change.expected_version`; appends the alert in the same transaction.
  fn apply_status(
    &self,
    change: StatusChange,
  ) -> impl Future<Output = Result<TrackedTourist, Self::Error>> + Send + '_;

  // ── Location store ────────────────────────────────────────────────────

  /// Append a history row and advance the current location if the sample is
  /// not older than it, in one transaction.
  ///
  /// Fails when no visit exists or the latest visit is returned.
  fn record_location(
    &self,
    location: NewLocation,
  ) -> impl Future<Output = Result<LocationOutcome, Self::Error>> + Send + '_;

  /// History for `blockchain_id`, newest first, at most `query.limit` rows.
  fn history<'a>(
    &'a self,
    blockchain_id: &'a str,
    query: &'a HistoryQuery,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + 'a;

  /// Delete history recorded before `older_than`, for one tourist or all.
  /// Returns the number of rows removed.
  fn prune_history(
    &self,
    older_than: DateTime<Utc>,
    blockchain_id: Option<String>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Alerts raised against a visit, newest first.
  fn alerts(
    &self,
    visit_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TrackingAlert>, Self::Error>> + Send + '_;

  /// Alerts across all visits matching `query`, newest first.
  fn list_alerts(
    &self,
    query: AlertQuery,
  ) -> impl Future<Output = Result<Vec<TrackingAlert>, Self::Error>> + Send + '_;

  /// Mark an alert resolved. Acknowledging twice keeps the first
  /// acknowledger and time. Fails with not-found for an unknown alert.
  fn acknowledge_alert(
    &self,
    alert_id: Uuid,
    by: String,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<TrackingAlert, Self::Error>> + Send + '_;

  /// Non-returned visits whose current location lies inside `bbox`.
  fn live_within(
    &self,
    bbox: BoundingBox,
  ) -> impl Future<Output = Result<Vec<TrackedTourist>, Self::Error>> + Send + '_;
}
