//! Read endpoints for the dashboard.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tourists` | Optional `?status=active\|suspicious\|emergency` |
//! | `GET`  | `/tourist/:blockchainId` | 404 if never linked |
//! | `POST` | `/nearby` | Body: [`NearbyBody`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
};
use serde::{Deserialize, Serialize};
use trailguard_core::{
  service::{NearbyTourist, TouristDetails, TrackingService},
  store::TrackingStore,
  tourist::{GeoPoint, TouristStatus, TrackedTourist},
};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<TouristStatus>,
}

#[derive(Debug, Serialize)]
pub struct TouristList {
  pub count:    usize,
  pub tourists: Vec<TrackedTourist>,
}

/// `GET /tourists[?status=<status>]`
pub async fn list<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<TouristList>, ApiError>
where
  S: TrackingStore + 'static,
{
  let Query(params) = params?;
  let tourists = svc.list_active(params.status).await?;
  Ok(Json(TouristList { count: tourists.len(), tourists }))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /tourist/:blockchainId`
pub async fn get_one<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  Path(blockchain_id): Path<String>,
) -> Result<Json<TouristDetails>, ApiError>
where
  S: TrackingStore + 'static,
{
  Ok(Json(svc.get_details(&blockchain_id).await?))
}

// ─── Nearby ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyBody {
  pub latitude:     f64,
  pub longitude:    f64,
  /// Metres; defaults to 5 km.
  pub max_distance: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct NearbyList {
  pub count:    usize,
  pub tourists: Vec<NearbyTourist>,
}

/// `POST /nearby`
pub async fn nearby<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  body: Result<Json<NearbyBody>, JsonRejection>,
) -> Result<Json<NearbyList>, ApiError>
where
  S: TrackingStore + 'static,
{
  let Json(body) = body?;
  let center = GeoPoint { latitude: body.latitude, longitude: body.longitude };
  let tourists = svc
    .nearby(center, body.max_distance.unwrap_or(5_000.0))
    .await?;
  Ok(Json(NearbyList { count: tourists.len(), tourists }))
}
