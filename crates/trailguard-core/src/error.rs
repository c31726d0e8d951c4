//! The error taxonomy shared by every Trailguard layer.
//!
//! Storage backends convert their own errors into this type; nothing below
//! the service boundary leaks through unclassified.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input. Never persisted.
  #[error("invalid input: {0}")]
  Validation(String),

  /// No tracking record exists for the blockchain ID, or no alert for the
  /// alert ID.
  #[error("not found: {0}")]
  NotFound(String),

  /// A non-returned record already exists, or a concurrent write won.
  #[error("conflict: {0}")]
  Conflict(String),

  /// Write against a record whose card has been returned.
  #[error("tourist {0} is no longer active")]
  Inactive(String),

  #[error("card for {0} is already returned")]
  AlreadyReturned(String),

  /// The sample arrived sooner than the configured minimum interval.
  #[error("location for {blockchain_id} rate limited; retry in {retry_after:?}")]
  RateLimited {
    blockchain_id: String,
    retry_after:   Duration,
  },

  #[error("storage call exceeded {0:?}")]
  StorageTimeout(Duration),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Stable machine-readable code for this error kind.
  pub fn code(&self) -> &'static str {
    match self {
      Self::Validation(_) => "validation_error",
      Self::NotFound(_) => "not_found",
      Self::Conflict(_) => "conflict",
      Self::Inactive(_) => "inactive",
      Self::AlreadyReturned(_) => "already_returned",
      Self::RateLimited { .. } => "rate_limited",
      Self::StorageTimeout(_) => "storage_timeout",
      Self::Storage(_) => "storage_error",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
