//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure is rendered as `{"error": "<code>", "message": "..."}` with
//! a status fixed per error kind, so clients can branch on `error`.

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use trailguard_core::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Tracking(#[from] Error),

  /// The body or query string could not be decoded.
  #[error("malformed request: {0}")]
  Malformed(String),
}

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self { Self::Malformed(r.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self { Self::Malformed(r.body_text()) }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::Malformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
      Self::Tracking(e) => match e {
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) | Error::AlreadyReturned(_) => StatusCode::CONFLICT,
        Error::Inactive(_) => StatusCode::GONE,
        Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::StorageTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      Self::Malformed(_) => "validation_error",
      Self::Tracking(e) => e.code(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut res = (
      status,
      Json(json!({ "error": self.code(), "message": self.to_string() })),
    )
      .into_response();

    if let ApiError::Tracking(Error::RateLimited { retry_after, .. }) = &self {
      let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
      if let Ok(v) = HeaderValue::from_str(&secs.max(1).to_string()) {
        res.headers_mut().insert(header::RETRY_AFTER, v);
      }
    }
    res
  }
}
