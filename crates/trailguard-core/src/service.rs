//! [`TrackingService`]: orchestration for linking, ingestion, history and
//! card return.
//!
//! The service owns all decision logic: input validation, per-tourist rate
//! limiting, status transitions and retention. Storage is reached only
//! through [`TrackingStore`], every call bounded by
//! [`ServicePolicy::storage_timeout`].

use std::{
  future::Future,
  time::{Duration, Instant},
};

use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  geo::{self, BoundingBox},
  lifecycle::{AlertKind, AlertQuery, NewAlert, StatusChange, StatusCommand, TrackingAlert},
  location::{
    HistoryCursor, HistoryEntry, HistoryQuery, LocationOutcome, LocationSample,
    LocationSource, NewLocation,
  },
  rate_limit::RateLimiter,
  store::TrackingStore,
  tourist::{CurrentLocation, GeoPoint, NewLink, TouristStatus, TrackedTourist},
  validate,
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Tunables for the service. All storage calls share one timeout.
#[derive(Debug, Clone)]
pub struct ServicePolicy {
  pub storage_timeout:       Duration,
  /// Minimum spacing between accepted samples for one tourist.
  pub min_sample_interval:   Duration,
  /// History older than this is pruned on card return and by the sweeper.
  /// `None` keeps history forever.
  pub history_retention:     Option<Duration>,
  pub default_history_limit: usize,
  pub max_history_limit:     usize,
  pub default_path_limit:    usize,
  pub max_nearby_distance_m: f64,
  pub default_alert_limit:   usize,
  pub max_alert_limit:       usize,
}

impl Default for ServicePolicy {
  fn default() -> Self {
    Self {
      storage_timeout:       Duration::from_secs(5),
      min_sample_interval:   Duration::from_secs(5),
      history_retention:     Some(Duration::from_secs(90 * 24 * 60 * 60)),
      default_history_limit: 100,
      max_history_limit:     1_000,
      default_path_limit:    50,
      max_nearby_distance_m: 100_000.0,
      default_alert_limit:   50,
      max_alert_limit:       500,
    }
  }
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// A visit together with the alerts raised against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouristDetails {
  #[serde(flatten)]
  pub tourist: TrackedTourist,
  pub alerts:  Vec<TrackingAlert>,
}

/// One page of newest-first history. `next` resumes after the last entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
  pub entries: Vec<HistoryEntry>,
  pub next:    Option<HistoryCursor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyTourist {
  #[serde(flatten)]
  pub tourist:    TrackedTourist,
  pub distance_m: f64,
}

/// A simplified point for drawing a tourist's route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
  pub lat:  f64,
  pub lng:  f64,
  pub time: chrono::DateTime<Utc>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct TrackingService<S> {
  store:   S,
  policy:  ServicePolicy,
  limiter: RateLimiter,
}

impl<S: TrackingStore> TrackingService<S> {
  pub fn new(store: S, policy: ServicePolicy) -> Self {
    let limiter = RateLimiter::new(policy.min_sample_interval);
    Self { store, policy, limiter }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn policy(&self) -> &ServicePolicy { &self.policy }

  /// Run one storage call under the configured timeout and classify its
  /// error.
  async fn guarded<T, E>(
    &self,
    fut: impl Future<Output = std::result::Result<T, E>>,
  ) -> Result<T>
  where
    E: Into<Error>,
  {
    match tokio::time::timeout(self.policy.storage_timeout, fut).await {
      Ok(res) => res.map_err(Into::into),
      Err(_) => Err(Error::StorageTimeout(self.policy.storage_timeout)),
    }
  }

  async fn require_visit(&self, blockchain_id: &str) -> Result<TrackedTourist> {
    self
      .guarded(self.store.latest_visit(blockchain_id.to_owned()))
      .await?
      .ok_or_else(|| Error::NotFound(blockchain_id.to_owned()))
  }

  /// Persist a decided status change. If a concurrent write moved the
  /// version first, the visit is read once more: a command the new state
  /// refuses reports that refusal, anything else stays a conflict.
  async fn persist_status(
    &self,
    blockchain_id: &str,
    command: StatusCommand,
    change: StatusChange,
  ) -> Result<TrackedTourist> {
    match self.guarded(self.store.apply_status(change)).await {
      Err(Error::Conflict(reason)) => {
        let latest = self.require_visit(blockchain_id).await?;
        debug!(blockchain_id, status = %latest.status, "status write lost a race");
        latest.status.transition(command, blockchain_id)?;
        Err(Error::Conflict(reason))
      }
      other => other,
    }
  }

  // ── Link registry ─────────────────────────────────────────────────────

  /// Start tracking a tourist. Rejects a second link while one is live.
  pub async fn link(&self, input: NewLink) -> Result<TrackedTourist> {
    validate::blockchain_id(&input.blockchain_id)?;
    validate::phone_number(&input.phone_number)?;
    validate::point(input.initial_location)?;

    let now = Utc::now();
    let visit_id = Uuid::new_v4();
    let GeoPoint { latitude, longitude } = input.initial_location;

    let tourist = TrackedTourist {
      visit_id,
      blockchain_id: input.blockchain_id.clone(),
      phone_number: input.phone_number.trim().to_owned(),
      tourist_info: input.tourist_info,
      status: TouristStatus::Active,
      current_location: CurrentLocation {
        latitude,
        longitude,
        accuracy: None,
        speed: None,
        heading: None,
        recorded_at: now,
      },
      issued_at: now,
      returned_at: None,
      last_updated: now,
      version: 0,
    };

    let initial = HistoryEntry {
      entry_id: Uuid::new_v4(),
      visit_id,
      blockchain_id: input.blockchain_id.clone(),
      latitude,
      longitude,
      accuracy: None,
      speed: None,
      heading: None,
      altitude: None,
      source: LocationSource::Manual,
      recorded_at: now,
      received_at: now,
      out_of_order: false,
    };

    let linked = self.guarded(self.store.insert_link(tourist, initial)).await?;
    self.limiter.forget(&linked.blockchain_id);
    info!(
      blockchain_id = %linked.blockchain_id,
      visit_id = %linked.visit_id,
      "tourist linked"
    );
    Ok(linked)
  }

  /// Mark the card returned and apply the retention policy to the tourist's
  /// history.
  pub async fn return_card(&self, blockchain_id: &str) -> Result<TrackedTourist> {
    let current = self.require_visit(blockchain_id).await?;
    let next = current
      .status
      .transition(StatusCommand::Return, blockchain_id)?;

    let now = Utc::now();
    let returned = self
      .persist_status(blockchain_id, StatusCommand::Return, StatusChange {
        visit_id:         current.visit_id,
        expected_version: current.version,
        status:           next,
        at:               now,
        alert:            None,
      })
      .await?;
    self.limiter.forget(blockchain_id);
    info!(blockchain_id, visit_id = %returned.visit_id, "card returned");

    // The return is already durable; a failed prune must not undo it.
    if let Some(cutoff) = self.retention_cutoff() {
      match self
        .guarded(self.store.prune_history(cutoff, Some(blockchain_id.to_owned())))
        .await
      {
        Ok(0) => {}
        Ok(n) => debug!(blockchain_id, pruned = n, "history pruned on return"),
        Err(e) => warn!(blockchain_id, error = %e, "history prune failed"),
      }
    }

    Ok(returned)
  }

  /// Feed a classifier verdict (suspicious, emergency, or back to active).
  pub async fn update_status(
    &self,
    blockchain_id: &str,
    target: TouristStatus,
    alert_message: Option<String>,
    alert_kind: Option<AlertKind>,
  ) -> Result<TrackedTourist> {
    let command = StatusCommand::toward(target)?;
    let current = self.require_visit(blockchain_id).await?;
    let next = current.status.transition(command, blockchain_id)?;

    let alert = alert_message
      .filter(|m| !m.trim().is_empty())
      .map(|message| NewAlert {
        kind: alert_kind.unwrap_or_else(|| AlertKind::for_status(next)),
        message,
      });

    let updated = self
      .persist_status(blockchain_id, command, StatusChange {
        visit_id: current.visit_id,
        expected_version: current.version,
        status: next,
        at: Utc::now(),
        alert,
      })
      .await?;
    info!(
      blockchain_id,
      from = %current.status,
      to = %updated.status,
      "status updated"
    );
    Ok(updated)
  }

  // ── Location store ────────────────────────────────────────────────────

  /// Validate, rate-limit and persist one sample.
  pub async fn ingest_location(
    &self,
    blockchain_id: &str,
    sample: LocationSample,
  ) -> Result<LocationOutcome> {
    validate::blockchain_id(blockchain_id)?;
    let received_at = Utc::now();
    validate::sample(&sample, received_at)?;

    let permit = self
      .limiter
      .try_acquire(blockchain_id, Instant::now())
      .map_err(|retry_after| {
        warn!(blockchain_id, ?retry_after, "sample rate limited");
        Error::RateLimited { blockchain_id: blockchain_id.to_owned(), retry_after }
      })?;

    let location = NewLocation::from_sample(blockchain_id.to_owned(), sample, received_at);
    match self.guarded(self.store.record_location(location)).await {
      Ok(outcome) => {
        if outcome.applied() {
          debug!(blockchain_id, recorded_at = %outcome.entry.recorded_at, "location applied");
        } else {
          warn!(
            blockchain_id,
            recorded_at = %outcome.entry.recorded_at,
            current = %outcome.current_location.recorded_at,
            "out-of-order sample kept in history only"
          );
        }
        Ok(outcome)
      }
      // A timed-out write may still commit, so it keeps its slot.
      Err(e @ Error::StorageTimeout(_)) => Err(e),
      Err(e) => {
        self.limiter.release(permit);
        Err(e)
      }
    }
  }

  /// One page of history, newest first.
  pub async fn history(
    &self,
    blockchain_id: &str,
    limit: Option<usize>,
    before: Option<HistoryCursor>,
    since: Option<chrono::DateTime<Utc>>,
  ) -> Result<HistoryPage> {
    validate::blockchain_id(blockchain_id)?;
    self.require_visit(blockchain_id).await?;

    let limit = limit
      .unwrap_or(self.policy.default_history_limit)
      .clamp(1, self.policy.max_history_limit);
    let query = HistoryQuery { limit, before, since };
    let entries = self.guarded(self.store.history(blockchain_id, &query)).await?;

    let next = if entries.len() == limit {
      entries.last().map(HistoryEntry::cursor)
    } else {
      None
    };
    Ok(HistoryPage { entries, next })
  }

  /// A lazy pager over the full history, restartable from any cursor.
  pub fn history_pages(
    &self,
    blockchain_id: impl Into<String>,
    page_size: usize,
    start: Option<HistoryCursor>,
  ) -> HistoryPages<'_, S> {
    HistoryPages {
      service: self,
      blockchain_id: blockchain_id.into(),
      page_size,
      since: None,
      cursor: start,
      done: false,
    }
  }

  /// The latest `limit` points, oldest first.
  pub async fn path(&self, blockchain_id: &str, limit: Option<usize>) -> Result<Vec<PathPoint>> {
    let limit = limit.unwrap_or(self.policy.default_path_limit);
    let page = self.history(blockchain_id, Some(limit), None, None).await?;
    Ok(
      page
        .entries
        .iter()
        .rev()
        .map(|e| PathPoint { lat: e.latitude, lng: e.longitude, time: e.recorded_at })
        .collect(),
    )
  }

  /// Delete history past the retention window for every tourist.
  pub async fn prune_expired(&self) -> Result<u64> {
    let Some(cutoff) = self.retention_cutoff() else {
      return Ok(0);
    };
    let removed = self.guarded(self.store.prune_history(cutoff, None)).await?;
    if removed > 0 {
      info!(removed, %cutoff, "expired history pruned");
    }
    Ok(removed)
  }

  fn retention_cutoff(&self) -> Option<chrono::DateTime<Utc>> {
    let retention = TimeDelta::from_std(self.policy.history_retention?).ok()?;
    Utc::now().checked_sub_signed(retention)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Every tourist whose card is still out.
  pub async fn list_active(&self, status: Option<TouristStatus>) -> Result<Vec<TrackedTourist>> {
    if status == Some(TouristStatus::Returned) {
      return Err(Error::Validation(
        "returned tourists are not part of the active list".into(),
      ));
    }
    self.guarded(self.store.list_live(status)).await
  }

  pub async fn get_details(&self, blockchain_id: &str) -> Result<TouristDetails> {
    let tourist = self.require_visit(blockchain_id).await?;
    let alerts = self.guarded(self.store.alerts(tourist.visit_id)).await?;
    Ok(TouristDetails { tourist, alerts })
  }

  // ── Alerts ────────────────────────────────────────────────────────────

  /// The alert feed, newest first, optionally narrowed to one tourist, to
  /// open or resolved alerts, and to alerts raised since an instant.
  pub async fn list_alerts(
    &self,
    blockchain_id: Option<String>,
    resolved: Option<bool>,
    since: Option<chrono::DateTime<Utc>>,
    limit: Option<usize>,
  ) -> Result<Vec<TrackingAlert>> {
    if let Some(id) = &blockchain_id {
      validate::blockchain_id(id)?;
    }
    let limit = limit
      .unwrap_or(self.policy.default_alert_limit)
      .clamp(1, self.policy.max_alert_limit);
    let query = AlertQuery { blockchain_id, resolved, since, limit };
    self.guarded(self.store.list_alerts(query)).await
  }

  /// Mark an alert resolved. Repeating the call is harmless and reports the
  /// first acknowledgement.
  pub async fn acknowledge_alert(
    &self,
    alert_id: Uuid,
    acknowledged_by: Option<String>,
  ) -> Result<TrackingAlert> {
    let by = acknowledged_by
      .map(|b| b.trim().to_owned())
      .filter(|b| !b.is_empty())
      .unwrap_or_else(|| "system".to_owned());
    if by.chars().count() > 128 {
      return Err(Error::Validation(
        "acknowledgedBy must be at most 128 characters".into(),
      ));
    }

    let alert = self
      .guarded(self.store.acknowledge_alert(alert_id, by, Utc::now()))
      .await?;
    info!(
      %alert_id,
      blockchain_id = %alert.blockchain_id,
      by = alert.resolved_by.as_deref().unwrap_or("-"),
      "alert acknowledged"
    );
    Ok(alert)
  }

  /// Live tourists within `max_distance_m` of `center`, nearest first.
  pub async fn nearby(&self, center: GeoPoint, max_distance_m: f64) -> Result<Vec<NearbyTourist>> {
    validate::point(center)?;
    if !max_distance_m.is_finite()
      || max_distance_m <= 0.0
      || max_distance_m > self.policy.max_nearby_distance_m
    {
      return Err(Error::Validation(format!(
        "maxDistance must be in (0, {}] metres",
        self.policy.max_nearby_distance_m
      )));
    }

    let bbox = BoundingBox::around(center, max_distance_m);
    let candidates = self.guarded(self.store.live_within(bbox)).await?;

    let mut hits: Vec<NearbyTourist> = candidates
      .into_iter()
      .map(|tourist| {
        let distance_m = geo::distance_m(center, tourist.current_location.point());
        NearbyTourist { tourist, distance_m }
      })
      .filter(|n| n.distance_m <= max_distance_m)
      .collect();
    hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    Ok(hits)
  }
}

// ─── Pager ───────────────────────────────────────────────────────────────────

/// Fetches history one page per [`next_page`](Self::next_page) call. Finite:
/// yields `None` once the history is exhausted.
pub struct HistoryPages<'a, S> {
  service:       &'a TrackingService<S>,
  blockchain_id: String,
  page_size:     usize,
  since:         Option<chrono::DateTime<Utc>>,
  cursor:        Option<HistoryCursor>,
  done:          bool,
}

impl<S: TrackingStore> HistoryPages<'_, S> {
  /// Stop at entries recorded before `since`.
  pub fn since(mut self, since: chrono::DateTime<Utc>) -> Self {
    self.since = Some(since);
    self
  }

  /// Where a new pager should start to continue from here.
  pub fn cursor(&self) -> Option<HistoryCursor> { self.cursor }

  pub async fn next_page(&mut self) -> Result<Option<Vec<HistoryEntry>>> {
    if self.done {
      return Ok(None);
    }
    let page = self
      .service
      .history(&self.blockchain_id, Some(self.page_size), self.cursor, self.since)
      .await?;

    match page.next {
      Some(next) => self.cursor = Some(next),
      None => self.done = true,
    }
    if page.entries.is_empty() {
      self.done = true;
      return Ok(None);
    }
    if self.done {
      self.cursor = page.entries.last().map(HistoryEntry::cursor);
    }
    Ok(Some(page.entries))
  }
}
