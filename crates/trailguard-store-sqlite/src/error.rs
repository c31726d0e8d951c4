//! Error type for `trailguard-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A column held a value the domain types cannot represent.
  #[error("decode error: {0}")]
  Decode(String),

  #[error("no tracking record for {0}")]
  UnknownTourist(String),

  #[error("card for {0} has been returned")]
  Inactive(String),

  #[error("{0} already has a live tracking record")]
  ActiveLinkExists(String),

  #[error("visit not found: {0}")]
  VisitNotFound(Uuid),

  #[error("alert not found: {0}")]
  AlertNotFound(Uuid),

  /// The visit changed between read and write.
  #[error("visit {0} was modified concurrently")]
  VersionMismatch(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for trailguard_core::Error {
  fn from(e: Error) -> Self {
    use trailguard_core::Error as Core;
    match e {
      Error::UnknownTourist(id) => Core::NotFound(id),
      Error::Inactive(id) => Core::Inactive(id),
      Error::ActiveLinkExists(id) => {
        Core::Conflict(format!("blockchain ID {id} is already linked"))
      }
      Error::VisitNotFound(id) => Core::NotFound(id.to_string()),
      Error::AlertNotFound(id) => Core::NotFound(format!("alert {id}")),
      Error::VersionMismatch(id) => {
        Core::Conflict(format!("visit {id} was modified concurrently; retry"))
      }
      other => Core::Storage(Box::new(other)),
    }
  }
}
