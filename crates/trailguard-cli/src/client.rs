//! Async HTTP client wrapping the Trailguard JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use trailguard_core::{
  lifecycle::TrackingAlert,
  location::{HistoryCursor, HistoryEntry, LocationSample},
  service::TouristDetails,
  tourist::{CurrentLocation, NewLink, TouristStatus, TrackedTourist},
};

/// Connection settings for the Trailguard API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the Trailguard JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAck {
  pub applied:          bool,
  pub entry:            HistoryEntry,
  pub current_location: CurrentLocation,
}

/// Result of posting one sample.
#[derive(Debug)]
pub enum Delivery {
  Accepted(LocationAck),
  /// The server asked us to slow down.
  RateLimited { retry_after: Option<Duration> },
}

#[derive(Debug, Deserialize)]
pub struct TouristList {
  pub count:    usize,
  pub tourists: Vec<TrackedTourist>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryPage {
  pub count:   usize,
  pub history: Vec<HistoryEntry>,
  pub next:    Option<HistoryCursor>,
}

#[derive(Debug, Deserialize)]
pub struct AlertList {
  pub count:  usize,
  pub alerts: Vec<TrackingAlert>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnAck {
  pub status:      TouristStatus,
  pub returned_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationBody<'a> {
  blockchain_id: &'a str,
  #[serde(flatten)]
  sample:        &'a LocationSample,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  // ── Link registry ─────────────────────────────────────────────────────────

  /// `POST /api/link`
  pub async fn link(&self, input: &NewLink) -> Result<TrackedTourist> {
    let resp = self
      .auth(self.client.post(self.url("/link")))
      .json(input)
      .send()
      .await
      .context("POST /link failed")?;
    ensure_success(resp, "POST /link")
      .await?
      .json()
      .await
      .context("deserialising linked tourist")
  }

  /// `POST /api/return`
  pub async fn return_card(&self, blockchain_id: &str) -> Result<ReturnAck> {
    let resp = self
      .auth(self.client.post(self.url("/return")))
      .json(&serde_json::json!({ "blockchainId": blockchain_id }))
      .send()
      .await
      .context("POST /return failed")?;
    ensure_success(resp, "POST /return")
      .await?
      .json()
      .await
      .context("deserialising return acknowledgement")
  }

  // ── Location store ────────────────────────────────────────────────────────

  /// `POST /api/location`
  pub async fn send_location(
    &self,
    blockchain_id: &str,
    sample: &LocationSample,
  ) -> Result<Delivery> {
    let resp = self
      .auth(self.client.post(self.url("/location")))
      .json(&LocationBody { blockchain_id, sample })
      .send()
      .await
      .context("POST /location failed")?;

    if resp.status() == StatusCode::TOO_MANY_REQUESTS {
      let retry_after = resp
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs);
      return Ok(Delivery::RateLimited { retry_after });
    }
    let ack = ensure_success(resp, "POST /location")
      .await?
      .json()
      .await
      .context("deserialising location acknowledgement")?;
    Ok(Delivery::Accepted(ack))
  }

  /// `GET /api/history/<id>?limit=N[&before=..&beforeId=..]`
  pub async fn history(
    &self,
    blockchain_id: &str,
    limit: usize,
    before: Option<HistoryCursor>,
  ) -> Result<HistoryPage> {
    let mut query = vec![("limit", limit.to_string())];
    if let Some(c) = before {
      query.push(("before", c.recorded_at.to_rfc3339_opts(SecondsFormat::Nanos, true)));
      query.push(("beforeId", c.entry_id.to_string()));
    }
    let path = format!("/history/{blockchain_id}");
    let resp = self
      .auth(self.client.get(self.url(&path)))
      .query(&query)
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    ensure_success(resp, "GET /history")
      .await?
      .json()
      .await
      .context("deserialising history")
  }

  // ── Dashboard reads ───────────────────────────────────────────────────────

  /// `GET /api/tourists[?status=<status>]`
  pub async fn tourists(&self, status: Option<TouristStatus>) -> Result<TouristList> {
    let mut req = self.auth(self.client.get(self.url("/tourists")));
    if let Some(s) = status {
      req = req.query(&[("status", s.as_ref())]);
    }
    let resp = req.send().await.context("GET /tourists failed")?;
    ensure_success(resp, "GET /tourists")
      .await?
      .json()
      .await
      .context("deserialising tourists")
  }

  /// `GET /api/tourist/<id>`
  pub async fn tourist(&self, blockchain_id: &str) -> Result<TouristDetails> {
    let path = format!("/tourist/{blockchain_id}");
    let resp = self
      .auth(self.client.get(self.url(&path)))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    ensure_success(resp, "GET /tourist")
      .await?
      .json()
      .await
      .context("deserialising tourist")
  }

  // ── Alerts ────────────────────────────────────────────────────────────────

  /// `GET /api/alerts[?blockchainId=..][&resolved=..]&limit=N`
  pub async fn alerts(
    &self,
    blockchain_id: Option<&str>,
    resolved: Option<bool>,
    limit: usize,
  ) -> Result<AlertList> {
    let mut query = vec![("limit", limit.to_string())];
    if let Some(id) = blockchain_id {
      query.push(("blockchainId", id.to_owned()));
    }
    if let Some(r) = resolved {
      query.push(("resolved", r.to_string()));
    }
    let resp = self
      .auth(self.client.get(self.url("/alerts")))
      .query(&query)
      .send()
      .await
      .context("GET /alerts failed")?;
    ensure_success(resp, "GET /alerts")
      .await?
      .json()
      .await
      .context("deserialising alerts")
  }

  /// `PATCH /api/alerts/<id>/acknowledge`
  pub async fn acknowledge(&self, alert_id: &str, by: Option<&str>) -> Result<TrackingAlert> {
    let path = format!("/alerts/{alert_id}/acknowledge");
    let resp = self
      .auth(self.client.patch(self.url(&path)))
      .json(&serde_json::json!({ "acknowledgedBy": by }))
      .send()
      .await
      .with_context(|| format!("PATCH {path} failed"))?;
    ensure_success(resp, "PATCH /alerts")
      .await?
      .json()
      .await
      .context("deserialising acknowledged alert")
  }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn ensure_success(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  #[derive(Deserialize)]
  struct Body {
    error:   String,
    message: String,
  }
  match resp.json::<Body>().await {
    Ok(b) => Err(anyhow!("{what} → {status} {}: {}", b.error, b.message)),
    Err(_) => Err(anyhow!("{what} → {status}")),
  }
}
