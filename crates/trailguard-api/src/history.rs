//! Handlers for `GET /history/:blockchainId` and `GET /path/:blockchainId`.
//!
//! History is paginated by keyset: pass the `next` object from one response
//! back as `before` + `beforeId` to fetch the following page.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State, rejection::QueryRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trailguard_core::{
  location::{HistoryCursor, HistoryEntry},
  service::{PathPoint, TrackingService},
  store::TrackingStore,
};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
  pub limit:     Option<usize>,
  /// Only entries recorded strictly before this instant (or, with
  /// `beforeId`, strictly after that entry in newest-first order).
  pub before:    Option<DateTime<Utc>>,
  pub before_id: Option<Uuid>,
  pub since:     Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
  pub blockchain_id: String,
  pub count:         usize,
  pub history:       Vec<HistoryEntry>,
  pub next:          Option<HistoryCursor>,
}

/// `GET /history/:blockchainId[?limit=N][&before=...&beforeId=...][&since=...]`
pub async fn handler<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  Path(blockchain_id): Path<String>,
  params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError>
where
  S: TrackingStore + 'static,
{
  let Query(params) = params?;
  // A bare timestamp is exclusive: the nil UUID sorts below every entry.
  let before = params.before.map(|recorded_at| HistoryCursor {
    recorded_at,
    entry_id: params.before_id.unwrap_or(Uuid::nil()),
  });

  let page = svc
    .history(&blockchain_id, params.limit, before, params.since)
    .await?;
  Ok(Json(HistoryResponse {
    blockchain_id,
    count: page.entries.len(),
    history: page.entries,
    next: page.next,
  }))
}

#[derive(Debug, Deserialize)]
pub struct PathParams {
  pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResponse {
  pub blockchain_id: String,
  pub path:          Vec<PathPoint>,
}

/// `GET /path/:blockchainId[?limit=N]`: oldest to newest, for map polylines.
pub async fn path<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  Path(blockchain_id): Path<String>,
  params: Result<Query<PathParams>, QueryRejection>,
) -> Result<Json<PathResponse>, ApiError>
where
  S: TrackingStore + 'static,
{
  let Query(params) = params?;
  let path = svc.path(&blockchain_id, params.limit).await?;
  Ok(Json(PathResponse { blockchain_id, path }))
}
