//! Alert feed and acknowledgement.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/alerts` | `?blockchainId=&resolved=true\|false&since=<ts>&limit=N` |
//! | `PATCH` | `/alerts/:alertId/acknowledge` | Body: [`AcknowledgeBody`]; idempotent |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trailguard_core::{
  Error, lifecycle::TrackingAlert, service::TrackingService, store::TrackingStore,
};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AlertParams {
  pub blockchain_id: Option<String>,
  pub resolved:      Option<bool>,
  pub since:         Option<DateTime<Utc>>,
  pub limit:         Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AlertList {
  pub count:  usize,
  pub alerts: Vec<TrackingAlert>,
}

/// `GET /alerts`
pub async fn list<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  params: Result<Query<AlertParams>, QueryRejection>,
) -> Result<Json<AlertList>, ApiError>
where
  S: TrackingStore + 'static,
{
  let Query(p) = params?;
  let alerts = svc
    .list_alerts(p.blockchain_id, p.resolved, p.since, p.limit)
    .await?;
  Ok(Json(AlertList { count: alerts.len(), alerts }))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeBody {
  /// Who handled the alert; `system` when absent.
  pub acknowledged_by: Option<String>,
}

/// `PATCH /alerts/:alertId/acknowledge`
pub async fn acknowledge<S>(
  State(svc): State<Arc<TrackingService<S>>>,
  Path(alert_id): Path<String>,
  body: Result<Json<AcknowledgeBody>, JsonRejection>,
) -> Result<Json<TrackingAlert>, ApiError>
where
  S: TrackingStore + 'static,
{
  let alert_id = Uuid::parse_str(&alert_id)
    .map_err(|_| Error::Validation(format!("alertId {alert_id:?} is not a UUID")))?;
  let Json(body) = body?;
  Ok(Json(svc.acknowledge_alert(alert_id, body.acknowledged_by).await?))
}
