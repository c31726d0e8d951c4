//! [`SqliteStore`]: the SQLite implementation of [`TrackingStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use trailguard_core::{
  geo::BoundingBox,
  lifecycle::{AlertQuery, StatusChange, TrackingAlert},
  location::{HistoryEntry, HistoryQuery, LocationOutcome, NewLocation},
  store::TrackingStore,
  tourist::{TouristStatus, TrackedTourist},
};

use crate::{
  encode::{
    ALERT_COLUMNS, HISTORY_COLUMNS, RawAlert, RawHistoryEntry, RawTourist, TOURIST_COLUMNS,
    encode_dt, encode_tourist_info, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Reasons a transaction declined to write, decided inside the closure so
/// the check and the write share one transaction.
enum Refusal {
  Unknown,
  Returned,
  LiveExists,
  VisitMissing,
  Stale,
}

/// Latest visit for a blockchain ID, most recent issue first.
fn latest_visit_sql() -> String {
  format!(
    "SELECT {TOURIST_COLUMNS} FROM tracked_tourists
     WHERE blockchain_id = ?1
     ORDER BY issued_at DESC, rowid DESC
     LIMIT 1"
  )
}

fn insert_history(tx: &rusqlite::Transaction<'_>, e: &HistoryEntry) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO location_history (
       entry_id, visit_id, blockchain_id, latitude, longitude,
       accuracy, speed, heading, altitude, source,
       recorded_at, received_at, out_of_order
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    rusqlite::params![
      encode_uuid(e.entry_id),
      encode_uuid(e.visit_id),
      e.blockchain_id,
      e.latitude,
      e.longitude,
      e.accuracy,
      e.speed,
      e.heading,
      e.altitude,
      e.source.as_ref(),
      encode_dt(e.recorded_at),
      encode_dt(e.received_at),
      e.out_of_order,
    ],
  )?;
  Ok(())
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Trailguard store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_tourists(
    &self,
    sql: String,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<TrackedTourist>> {
    let raws: Vec<RawTourist> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawTourist::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTourist::into_tourist).collect()
  }
}

// ─── TrackingStore impl ──────────────────────────────────────────────────────

impl TrackingStore for SqliteStore {
  type Error = Error;

  // ── Link registry ─────────────────────────────────────────────────────────

  async fn insert_link(
    &self,
    tourist: TrackedTourist,
    initial: HistoryEntry,
  ) -> Result<TrackedTourist> {
    let info_json = encode_tourist_info(&tourist.tourist_info)?;
    let row = tourist.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let live: bool = tx
          .query_row(
            "SELECT 1 FROM tracked_tourists
             WHERE blockchain_id = ?1 AND status != 'returned'",
            rusqlite::params![row.blockchain_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if live {
          return Ok(Err(Refusal::LiveExists));
        }

        let loc = &row.current_location;
        tx.execute(
          "INSERT INTO tracked_tourists (
             visit_id, blockchain_id, phone_number, tourist_info, status,
             current_latitude, current_longitude, current_accuracy,
             current_speed, current_heading, current_recorded_at,
             issued_at, returned_at, last_updated, version
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL, ?13, ?14)",
          rusqlite::params![
            encode_uuid(row.visit_id),
            row.blockchain_id,
            row.phone_number,
            info_json,
            row.status.as_ref(),
            loc.latitude,
            loc.longitude,
            loc.accuracy,
            loc.speed,
            loc.heading,
            encode_dt(loc.recorded_at),
            encode_dt(row.issued_at),
            encode_dt(row.last_updated),
            row.version as i64,
          ],
        )?;
        insert_history(&tx, &initial)?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    match outcome {
      Ok(()) => Ok(tourist),
      Err(_) => Err(Error::ActiveLinkExists(tourist.blockchain_id)),
    }
  }

  async fn latest_visit(&self, blockchain_id: String) -> Result<Option<TrackedTourist>> {
    let raw: Option<RawTourist> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &latest_visit_sql(),
              rusqlite::params![blockchain_id],
              RawTourist::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTourist::into_tourist).transpose()
  }

  async fn list_live(&self, status: Option<TouristStatus>) -> Result<Vec<TrackedTourist>> {
    let (filter, params) = match status {
      Some(s) => (
        "AND status = ?1",
        vec![rusqlite::types::Value::Text(s.as_ref().to_owned())],
      ),
      None => ("", vec![]),
    };
    let sql = format!(
      "SELECT {TOURIST_COLUMNS} FROM tracked_tourists
       WHERE status != 'returned' {filter}
       ORDER BY last_updated DESC"
    );
    self.query_tourists(sql, params).await
  }

  async fn apply_status(&self, change: StatusChange) -> Result<TrackedTourist> {
    let visit_id = change.visit_id;
    let visit_str = encode_uuid(visit_id);
    let status_str = change.status.as_ref().to_owned();
    let at_str = encode_dt(change.at);
    let returned_at = (change.status == TouristStatus::Returned).then(|| at_str.clone());
    let alert = change.alert.map(|a| (encode_uuid(Uuid::new_v4()), a));

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
          "UPDATE tracked_tourists
           SET status = ?1, returned_at = ?2, last_updated = ?3, version = version + 1
           WHERE visit_id = ?4 AND version = ?5",
          rusqlite::params![
            status_str,
            returned_at,
            at_str,
            visit_str,
            change.expected_version as i64,
          ],
        )?;

        if changed == 0 {
          let exists = tx
            .query_row(
              "SELECT 1 FROM tracked_tourists WHERE visit_id = ?1",
              rusqlite::params![visit_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          return Ok(Err(if exists { Refusal::Stale } else { Refusal::VisitMissing }));
        }

        if let Some((alert_id, alert)) = &alert {
          tx.execute(
            "INSERT INTO tracking_alerts
               (alert_id, visit_id, blockchain_id, kind, message, raised_at, resolved)
             SELECT ?1, visit_id, blockchain_id, ?2, ?3, ?4, 0
             FROM tracked_tourists WHERE visit_id = ?5",
            rusqlite::params![alert_id, alert.kind.as_ref(), alert.message, at_str, visit_str],
          )?;
        }

        let raw = tx.query_row(
          &format!("SELECT {TOURIST_COLUMNS} FROM tracked_tourists WHERE visit_id = ?1"),
          rusqlite::params![visit_str],
          RawTourist::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    match outcome {
      Ok(raw) => raw.into_tourist(),
      Err(Refusal::Stale) => Err(Error::VersionMismatch(visit_id)),
      Err(_) => Err(Error::VisitNotFound(visit_id)),
    }
  }

  // ── Location store ────────────────────────────────────────────────────────

  async fn record_location(&self, location: NewLocation) -> Result<LocationOutcome> {
    let blockchain_id = location.blockchain_id.clone();
    // The visit and the ordering flag are settled inside the transaction.
    let mut entry = location.into_entry(Uuid::new_v4(), Uuid::nil());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(current) = tx
          .query_row(
            &latest_visit_sql(),
            rusqlite::params![entry.blockchain_id],
            RawTourist::from_row,
          )
          .optional()?
        else {
          return Ok(Err(Refusal::Unknown));
        };
        if current.is_returned() {
          return Ok(Err(Refusal::Returned));
        }

        let recorded_str = encode_dt(entry.recorded_at);
        entry.out_of_order = recorded_str < current.current_recorded_at;
        entry.visit_id = Uuid::parse_str(&current.visit_id)
          .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
        insert_history(&tx, &entry)?;

        // Compare-and-set on recorded_at: a delayed older sample never
        // overwrites a newer current location.
        tx.execute(
          "UPDATE tracked_tourists SET
             current_latitude    = CASE WHEN current_recorded_at <= ?1 THEN ?2 ELSE current_latitude END,
             current_longitude   = CASE WHEN current_recorded_at <= ?1 THEN ?3 ELSE current_longitude END,
             current_accuracy    = CASE WHEN current_recorded_at <= ?1 THEN ?4 ELSE current_accuracy END,
             current_speed       = CASE WHEN current_recorded_at <= ?1 THEN ?5 ELSE current_speed END,
             current_heading     = CASE WHEN current_recorded_at <= ?1 THEN ?6 ELSE current_heading END,
             current_recorded_at = MAX(current_recorded_at, ?1),
             last_updated        = ?7
           WHERE visit_id = ?8",
          rusqlite::params![
            recorded_str,
            entry.latitude,
            entry.longitude,
            entry.accuracy,
            entry.speed,
            entry.heading,
            encode_dt(entry.received_at),
            current.visit_id,
          ],
        )?;

        let after = tx.query_row(
          &format!("SELECT {TOURIST_COLUMNS} FROM tracked_tourists WHERE visit_id = ?1"),
          rusqlite::params![current.visit_id],
          RawTourist::from_row,
        )?;
        tx.commit()?;
        Ok(Ok((after, entry)))
      })
      .await?;

    let (after, entry) = match outcome {
      Ok(v) => v,
      Err(Refusal::Returned) => return Err(Error::Inactive(blockchain_id)),
      Err(_) => return Err(Error::UnknownTourist(blockchain_id)),
    };
    if entry.out_of_order {
      debug!(
        %blockchain_id,
        entry_id = %entry.entry_id,
        recorded_at = %entry.recorded_at,
        "stored out-of-order sample"
      );
    }

    let tourist = after.into_tourist()?;
    Ok(LocationOutcome { entry, current_location: tourist.current_location })
  }

  async fn history<'a>(
    &'a self,
    blockchain_id: &'a str,
    query: &'a HistoryQuery,
  ) -> Result<Vec<HistoryEntry>> {
    let id = blockchain_id.to_owned();
    let before_at = query.before.map(|c| encode_dt(c.recorded_at));
    let before_id = query.before.map(|c| encode_uuid(c.entry_id));
    let since = query.since.map(encode_dt);
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HISTORY_COLUMNS} FROM location_history
           WHERE blockchain_id = ?1
             AND (?2 IS NULL OR recorded_at < ?2 OR (recorded_at = ?2 AND entry_id < ?3))
             AND (?4 IS NULL OR recorded_at >= ?4)
           ORDER BY recorded_at DESC, entry_id DESC
           LIMIT ?5"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![id, before_at, before_id, since, limit],
            RawHistoryEntry::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }

  async fn prune_history(
    &self,
    older_than: DateTime<Utc>,
    blockchain_id: Option<String>,
  ) -> Result<u64> {
    let cutoff = encode_dt(older_than);
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM location_history
           WHERE recorded_at < ?1 AND (?2 IS NULL OR blockchain_id = ?2)",
          rusqlite::params![cutoff, blockchain_id],
        )?)
      })
      .await?;
    Ok(removed as u64)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn alerts(&self, visit_id: Uuid) -> Result<Vec<TrackingAlert>> {
    let visit_str = encode_uuid(visit_id);

    let raws: Vec<RawAlert> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ALERT_COLUMNS} FROM tracking_alerts
           WHERE visit_id = ?1
           ORDER BY raised_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![visit_str], RawAlert::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAlert::into_alert).collect()
  }

  async fn list_alerts(&self, query: AlertQuery) -> Result<Vec<TrackingAlert>> {
    let since = query.since.map(encode_dt);
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

    let raws: Vec<RawAlert> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ALERT_COLUMNS} FROM tracking_alerts
           WHERE (?1 IS NULL OR blockchain_id = ?1)
             AND (?2 IS NULL OR resolved = ?2)
             AND (?3 IS NULL OR raised_at >= ?3)
           ORDER BY raised_at DESC, rowid DESC
           LIMIT ?4"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![query.blockchain_id, query.resolved, since, limit],
            RawAlert::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAlert::into_alert).collect()
  }

  async fn acknowledge_alert(
    &self,
    alert_id: Uuid,
    by: String,
    at: DateTime<Utc>,
  ) -> Result<TrackingAlert> {
    let alert_str = encode_uuid(alert_id);
    let at_str = encode_dt(at);

    let raw: Option<RawAlert> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
          "UPDATE tracking_alerts SET
             resolved    = 1,
             resolved_by = COALESCE(resolved_by, ?2),
             resolved_at = COALESCE(resolved_at, ?3)
           WHERE alert_id = ?1",
          rusqlite::params![alert_str, by, at_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let raw = tx.query_row(
          &format!("SELECT {ALERT_COLUMNS} FROM tracking_alerts WHERE alert_id = ?1"),
          rusqlite::params![alert_str],
          RawAlert::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    match raw {
      Some(raw) => raw.into_alert(),
      None => Err(Error::AlertNotFound(alert_id)),
    }
  }

  async fn live_within(&self, bbox: BoundingBox) -> Result<Vec<TrackedTourist>> {
    use rusqlite::types::Value;

    let sql = format!(
      "SELECT {TOURIST_COLUMNS} FROM tracked_tourists
       WHERE status != 'returned'
         AND current_latitude  BETWEEN ?1 AND ?2
         AND current_longitude BETWEEN ?3 AND ?4"
    );
    let params = vec![
      Value::Real(bbox.min_latitude),
      Value::Real(bbox.max_latitude),
      Value::Real(bbox.min_longitude),
      Value::Real(bbox.max_longitude),
    ];
    self.query_tourists(sql, params).await
  }
}
