//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{TimeDelta, Utc};
use trailguard_core::{
  geo::BoundingBox,
  lifecycle::{AlertKind, AlertQuery, NewAlert, StatusChange},
  location::{HistoryEntry, HistoryQuery, LocationSource, NewLocation},
  store::TrackingStore,
  tourist::{CurrentLocation, GeoPoint, TouristInfo, TouristStatus, TrackedTourist},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn visit(blockchain_id: &str, lat: f64, lng: f64) -> (TrackedTourist, HistoryEntry) {
  let now = Utc::now();
  let visit_id = Uuid::new_v4();
  let tourist = TrackedTourist {
    visit_id,
    blockchain_id: blockchain_id.into(),
    phone_number: "+15550100".into(),
    tourist_info: TouristInfo {
      name: Some("Ada".into()),
      nationality: Some("IN".into()),
      ..TouristInfo::default()
    },
    status: TouristStatus::Active,
    current_location: CurrentLocation {
      latitude:    lat,
      longitude:   lng,
      accuracy:    None,
      speed:       None,
      heading:     None,
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
    blockchain_id: blockchain_id.into(),
    latitude: lat,
    longitude: lng,
    accuracy: None,
    speed: None,
    heading: None,
    altitude: None,
    source: LocationSource::Manual,
    recorded_at: now,
    received_at: now,
    out_of_order: false,
  };
  (tourist, initial)
}

fn sample(blockchain_id: &str, lat: f64, lng: f64, offset_secs: i64) -> NewLocation {
  let now = Utc::now();
  NewLocation {
    blockchain_id: blockchain_id.into(),
    latitude:      lat,
    longitude:     lng,
    accuracy:      Some(5.0),
    speed:         None,
    heading:       None,
    altitude:      None,
    source:        LocationSource::Gps,
    recorded_at:   now + TimeDelta::seconds(offset_secs),
    received_at:   now,
  }
}

async fn link(s: &SqliteStore, id: &str) -> TrackedTourist {
  let (t, h) = visit(id, 10.0, 20.0);
  s.insert_link(t, h).await.unwrap()
}

fn returned(t: &TrackedTourist) -> StatusChange {
  StatusChange {
    visit_id:         t.visit_id,
    expected_version: t.version,
    status:           TouristStatus::Returned,
    at:               Utc::now(),
    alert:            None,
  }
}

// ─── Link registry ───────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_read_back_latest_visit() {
  let s = store().await;
  let linked = link(&s, "TID-1").await;

  let fetched = s.latest_visit("TID-1".into()).await.unwrap().unwrap();
  assert_eq!(fetched.visit_id, linked.visit_id);
  assert_eq!(fetched.status, TouristStatus::Active);
  assert_eq!(fetched.tourist_info.name.as_deref(), Some("Ada"));
  assert_eq!(fetched.current_location, linked.current_location);
  assert_eq!(fetched.issued_at, linked.issued_at);
}

#[tokio::test]
async fn latest_visit_missing_returns_none() {
  let s = store().await;
  assert!(s.latest_visit("nobody".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn second_live_link_is_refused() {
  let s = store().await;
  link(&s, "TID-1").await;

  let (t, h) = visit("TID-1", 1.0, 1.0);
  let err = s.insert_link(t, h).await.unwrap_err();
  assert!(matches!(err, Error::ActiveLinkExists(ref id) if id == "TID-1"));

  let live = s.list_live(None).await.unwrap();
  assert_eq!(live.len(), 1);
}

#[tokio::test]
async fn relink_after_return_creates_new_visit() {
  let s = store().await;
  let first = link(&s, "TID-1").await;
  s.apply_status(returned(&first)).await.unwrap();

  let second = link(&s, "TID-1").await;
  assert_ne!(second.visit_id, first.visit_id);

  let latest = s.latest_visit("TID-1".into()).await.unwrap().unwrap();
  assert_eq!(latest.visit_id, second.visit_id);
  assert_eq!(latest.status, TouristStatus::Active);
}

#[tokio::test]
async fn apply_status_bumps_version_and_sets_returned_at() {
  let s = store().await;
  let t = link(&s, "TID-1").await;

  let after = s.apply_status(returned(&t)).await.unwrap();
  assert_eq!(after.status, TouristStatus::Returned);
  assert_eq!(after.version, t.version + 1);
  assert!(after.returned_at.is_some());
  assert!(s.list_live(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_version_is_rejected() {
  let s = store().await;
  let t = link(&s, "TID-1").await;

  let mut flag = returned(&t);
  flag.status = TouristStatus::Suspicious;
  s.apply_status(flag.clone()).await.unwrap();

  // Same expected version again: someone else already moved it.
  let err = s.apply_status(flag).await.unwrap_err();
  assert!(matches!(err, Error::VersionMismatch(id) if id == t.visit_id));

  let err = s
    .apply_status(StatusChange { visit_id: Uuid::new_v4(), ..returned(&t) })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::VisitNotFound(_)));
}

#[tokio::test]
async fn alert_is_written_with_status_change() {
  let s = store().await;
  let t = link(&s, "TID-1").await;

  let mut change = returned(&t);
  change.status = TouristStatus::Emergency;
  change.alert = Some(NewAlert {
    kind:    AlertKind::Emergency,
    message: "SOS pressed".into(),
  });
  s.apply_status(change).await.unwrap();

  let alerts = s.alerts(t.visit_id).await.unwrap();
  assert_eq!(alerts.len(), 1);
  assert_eq!(alerts[0].kind, AlertKind::Emergency);
  assert_eq!(alerts[0].blockchain_id, "TID-1");
  assert!(!alerts[0].resolved);
}

async fn raise(
  s: &SqliteStore,
  t: TrackedTourist,
  status: TouristStatus,
  message: &str,
) -> TrackedTourist {
  s.apply_status(StatusChange {
    visit_id: t.visit_id,
    expected_version: t.version,
    status,
    at: Utc::now(),
    alert: Some(NewAlert { kind: AlertKind::for_status(status), message: message.into() }),
  })
  .await
  .unwrap()
}

#[tokio::test]
async fn acknowledging_twice_keeps_the_first_acknowledgement() {
  let s = store().await;
  let t = link(&s, "TID-1").await;
  let t = raise(&s, t, TouristStatus::Emergency, "SOS pressed").await;
  let alert_id = s.alerts(t.visit_id).await.unwrap()[0].alert_id;

  let first_at = Utc::now();
  let first = s
    .acknowledge_alert(alert_id, "officer-7".into(), first_at)
    .await
    .unwrap();
  assert!(first.resolved);
  assert_eq!(first.resolved_by.as_deref(), Some("officer-7"));
  assert_eq!(first.resolved_at, Some(first_at));

  let again = s
    .acknowledge_alert(alert_id, "officer-9".into(), first_at + TimeDelta::minutes(5))
    .await
    .unwrap();
  assert_eq!(again.resolved_by.as_deref(), Some("officer-7"));
  assert_eq!(again.resolved_at, Some(first_at));
}

#[tokio::test]
async fn acknowledging_unknown_alert_is_not_found() {
  let s = store().await;
  let id = Uuid::new_v4();
  let err = s
    .acknowledge_alert(id, "system".into(), Utc::now())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlertNotFound(got) if got == id));
}

#[tokio::test]
async fn alert_feed_filters_and_orders_newest_first() {
  let s = store().await;
  let a = link(&s, "TID-1").await;
  let b = link(&s, "TID-2").await;
  let a = raise(&s, a, TouristStatus::Suspicious, "off trail").await;
  let _ = raise(&s, b, TouristStatus::Emergency, "SOS pressed").await;
  raise(&s, a, TouristStatus::Emergency, "no response").await;

  let all = s
    .list_alerts(AlertQuery { limit: 10, ..AlertQuery::default() })
    .await
    .unwrap();
  assert_eq!(all.len(), 3);
  assert!(all.windows(2).all(|w| w[0].raised_at >= w[1].raised_at));
  assert_eq!(all[0].message, "no response");

  let for_a = s
    .list_alerts(AlertQuery {
      blockchain_id: Some("TID-1".into()),
      limit: 10,
      ..AlertQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(for_a.len(), 2);

  s.acknowledge_alert(all[0].alert_id, "system".into(), Utc::now())
    .await
    .unwrap();
  let open = s
    .list_alerts(AlertQuery { resolved: Some(false), limit: 10, ..AlertQuery::default() })
    .await
    .unwrap();
  assert_eq!(open.len(), 2);
  assert!(open.iter().all(|a| !a.resolved));

  let later = s
    .list_alerts(AlertQuery {
      since: Some(Utc::now() + TimeDelta::hours(1)),
      limit: 10,
      ..AlertQuery::default()
    })
    .await
    .unwrap();
  assert!(later.is_empty());

  let capped = s
    .list_alerts(AlertQuery { limit: 1, ..AlertQuery::default() })
    .await
    .unwrap();
  assert_eq!(capped.len(), 1);
}

#[tokio::test]
async fn list_live_filters_by_status() {
  let s = store().await;
  let a = link(&s, "TID-A").await;
  link(&s, "TID-B").await;

  let mut flag = returned(&a);
  flag.status = TouristStatus::Suspicious;
  s.apply_status(flag).await.unwrap();

  let suspicious = s.list_live(Some(TouristStatus::Suspicious)).await.unwrap();
  assert_eq!(suspicious.len(), 1);
  assert_eq!(suspicious[0].blockchain_id, "TID-A");
  assert_eq!(s.list_live(None).await.unwrap().len(), 2);
}

// ─── Location store ──────────────────────────────────────────────────────────

#[tokio::test]
async fn record_location_updates_current_and_appends_history() {
  let s = store().await;
  link(&s, "TID-1").await;

  let out = s.record_location(sample("TID-1", 10.001, 20.001, 1)).await.unwrap();
  assert!(!out.entry.out_of_order);
  assert_eq!(out.current_location.latitude, 10.001);
  assert_eq!(out.current_location.accuracy, Some(5.0));

  let q = HistoryQuery { limit: 10, ..HistoryQuery::default() };
  let history = s.history("TID-1", &q).await.unwrap();
  assert_eq!(history.len(), 2, "initial + sample");
  assert_eq!(history[0].entry_id, out.entry.entry_id);
  assert_eq!(history[1].source, LocationSource::Manual);
}

#[tokio::test]
async fn older_sample_never_replaces_current_location() {
  let s = store().await;
  link(&s, "TID-1").await;

  s.record_location(sample("TID-1", 11.0, 21.0, 60)).await.unwrap();
  let late = s.record_location(sample("TID-1", 12.0, 22.0, 30)).await.unwrap();

  assert!(late.entry.out_of_order);
  assert_eq!(late.current_location.latitude, 11.0);

  let t = s.latest_visit("TID-1".into()).await.unwrap().unwrap();
  assert_eq!(t.current_location.point(), GeoPoint { latitude: 11.0, longitude: 21.0 });
}

#[tokio::test]
async fn record_location_unknown_and_returned() {
  let s = store().await;
  let err = s.record_location(sample("ghost", 1.0, 1.0, 0)).await.unwrap_err();
  assert!(matches!(err, Error::UnknownTourist(_)));

  let t = link(&s, "TID-1").await;
  s.apply_status(returned(&t)).await.unwrap();
  let err = s.record_location(sample("TID-1", 1.0, 1.0, 5)).await.unwrap_err();
  assert!(matches!(err, Error::Inactive(_)));

  let q = HistoryQuery { limit: 10, ..HistoryQuery::default() };
  assert_eq!(s.history("TID-1", &q).await.unwrap().len(), 1);
}

#[tokio::test]
async fn history_cursor_pages_without_overlap() {
  let s = store().await;
  link(&s, "TID-1").await;
  for i in 1..=5 {
    s.record_location(sample("TID-1", 10.0 + i as f64 / 100.0, 20.0, i * 10))
      .await
      .unwrap();
  }

  let first = s
    .history("TID-1", &HistoryQuery { limit: 4, ..HistoryQuery::default() })
    .await
    .unwrap();
  assert_eq!(first.len(), 4);
  assert!(first.windows(2).all(|w| w[0].recorded_at > w[1].recorded_at));

  let rest = s
    .history(
      "TID-1",
      &HistoryQuery { limit: 4, before: Some(first[3].cursor()), since: None },
    )
    .await
    .unwrap();
  assert_eq!(rest.len(), 2);
  assert!(rest[0].recorded_at < first[3].recorded_at);
  assert!(rest.iter().all(|r| first.iter().all(|f| f.entry_id != r.entry_id)));
}

#[tokio::test]
async fn prune_history_respects_cutoff_and_tourist() {
  let s = store().await;
  link(&s, "TID-A").await;
  link(&s, "TID-B").await;
  s.record_location(sample("TID-A", 1.0, 1.0, -7200)).await.unwrap();
  s.record_location(sample("TID-B", 1.0, 1.0, -7200)).await.unwrap();

  let cutoff = Utc::now() - TimeDelta::hours(1);
  assert_eq!(s.prune_history(cutoff, Some("TID-A".into())).await.unwrap(), 1);
  assert_eq!(s.prune_history(cutoff, None).await.unwrap(), 1);
  assert_eq!(s.prune_history(cutoff, None).await.unwrap(), 0);
}

#[tokio::test]
async fn live_within_uses_bounding_box() {
  let s = store().await;
  link(&s, "NEAR").await;
  let (far, h) = visit("FAR", 40.0, -70.0);
  s.insert_link(far, h).await.unwrap();

  let bbox = BoundingBox::around(GeoPoint { latitude: 10.0, longitude: 20.0 }, 1_000.0);
  let hits = s.live_within(bbox).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].blockchain_id, "NEAR");
}
