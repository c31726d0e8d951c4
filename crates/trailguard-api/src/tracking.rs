//! Write endpoints: linking, location ingestion, card return, status.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/link` | Body: [`NewLink`]; 201 + record, 409 if already live |
//! | `POST`  | `/location` | Body: [`LocationBody`]; 404 / 410 / 422 / 429 |
//! | `POST`  | `/return` | Body: `{"blockchainId":"..."}`; 404 / 409 |
//! | `PATCH` | `/status/:blockchainId` | Body: [`StatusBody`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trailguard_core::{
  lifecycle::AlertKind,
  location::{HistoryEntry, LocationSample},
  service::TrackingService,
  store::TrackingStore,
  tourist::{CurrentLocation, NewLink, TouristStatus},
};

use crate::error::ApiError;

// ─── Link ─────────────────────────────────────────────────────────────────────

/// `POST /link`
pub async fn link<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  body: Result<Json<NewLink>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackingStore + 'static,
{
  let Json(input) = body?;
  let tourist = svc.link(input).await?;
  Ok((StatusCode::CREATED, Json(tourist)))
}

// ─── Location ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationBody {
  pub blockchain_id: String,
  #[serde(flatten)]
  pub sample:        LocationSample,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
  pub blockchain_id:    String,
  /// `false` when the sample was older than the current location.
  pub applied:          bool,
  pub entry:            HistoryEntry,
  pub current_location: CurrentLocation,
}

/// `POST /location`
pub async fn location<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  body: Result<Json<LocationBody>, JsonRejection>,
) -> Result<Json<LocationResponse>, ApiError>
where
  S: TrackingStore + 'static,
{
  let Json(LocationBody { blockchain_id, sample }) = body?;
  let outcome = svc.ingest_location(&blockchain_id, sample).await?;
  Ok(Json(LocationResponse {
    blockchain_id,
    applied: outcome.applied(),
    entry: outcome.entry,
    current_location: outcome.current_location,
  }))
}

// ─── Return ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnBody {
  pub blockchain_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnResponse {
  pub blockchain_id: String,
  pub status:        TouristStatus,
  pub returned_at:   Option<DateTime<Utc>>,
}

/// `POST /return`
pub async fn return_card<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  body: Result<Json<ReturnBody>, JsonRejection>,
) -> Result<Json<ReturnResponse>, ApiError>
where
  S: TrackingStore + 'static,
{
  let Json(ReturnBody { blockchain_id }) = body?;
  let tourist = svc.return_card(&blockchain_id).await?;
  Ok(Json(ReturnResponse {
    blockchain_id,
    status: tourist.status,
    returned_at: tourist.returned_at,
  }))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
  pub status:        TouristStatus,
  pub alert_message: Option<String>,
  pub alert_kind:    Option<AlertKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
  pub blockchain_id: String,
  pub status:        TouristStatus,
  pub version:       u64,
}

/// `PATCH /status/:blockchainId`
pub async fn update_status<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  Path(blockchain_id): Path<String>,
  body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError>
where
  S: TrackingStore + 'static,
{
  let Json(body) = body?;
  let tourist = svc
    .update_status(&blockchain_id, body.status, body.alert_message, body.alert_kind)
    .await?;
  Ok(Json(StatusResponse {
    blockchain_id,
    status: tourist.status,
    version: tourist.version,
  }))
}
