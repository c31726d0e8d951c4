//! Status transitions and alerts.
//!
//! Transitions are decided by a pure function over the current status and a
//! command. Persisting the result is a separate, version-checked step in the
//! store, so no check-then-act sequence ever spans two storage calls
//! unguarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, tourist::TouristStatus};

// ─── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCommand {
  /// Classifier reports suspicious activity.
  Flag,
  /// Classifier reports an emergency.
  Escalate,
  /// Back to normal tracking.
  Clear,
  /// The ID card was handed back.
  Return,
}

impl StatusCommand {
  /// The command that moves a live visit into `target`. `Returned` is not
  /// reachable this way; card return has its own operation.
  pub fn toward(target: TouristStatus) -> Result<Self> {
    match target {
      TouristStatus::Active => Ok(Self::Clear),
      TouristStatus::Suspicious => Ok(Self::Flag),
      TouristStatus::Emergency => Ok(Self::Escalate),
      TouristStatus::Returned => Err(Error::Validation(
        "status cannot be set to returned; return the card instead".into(),
      )),
    }
  }
}

impl TouristStatus {
  /// Decide the next status for `blockchain_id`.
  pub fn transition(
    self,
    command: StatusCommand,
    blockchain_id: &str,
  ) -> Result<TouristStatus> {
    use StatusCommand::*;
    use TouristStatus::*;

    match (self, command) {
      (Returned, Return) => Err(Error::AlreadyReturned(blockchain_id.into())),
      (Returned, _) => Err(Error::Inactive(blockchain_id.into())),
      (_, Return) => Ok(Returned),
      (_, Flag) => Ok(Suspicious),
      (_, Escalate) => Ok(Emergency),
      (_, Clear) => Ok(Active),
    }
  }
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertKind {
  GeofenceBreach,
  SuspiciousActivity,
  Emergency,
  Offline,
}

impl AlertKind {
  /// Default kind for an alert raised alongside a move to `status`.
  pub fn for_status(status: TouristStatus) -> Self {
    match status {
      TouristStatus::Emergency => Self::Emergency,
      _ => Self::SuspiciousActivity,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingAlert {
  pub alert_id:      Uuid,
  pub visit_id:      Uuid,
  pub blockchain_id: String,
  pub kind:          AlertKind,
  pub message:       String,
  pub raised_at:     DateTime<Utc>,
  pub resolved:      bool,
  pub resolved_by:   Option<String>,
  pub resolved_at:   Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
  pub kind:    AlertKind,
  pub message: String,
}

/// Filter for the alert feed. Every set field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
  pub blockchain_id: Option<String>,
  pub resolved:      Option<bool>,
  /// Only alerts raised at or after this instant.
  pub since:         Option<DateTime<Utc>>,
  pub limit:         usize,
}

// ─── Persisted change ────────────────────────────────────────────────────────

/// A decided status change, applied by the store only if the record is still
/// at `expected_version`.
#[derive(Debug, Clone)]
pub struct StatusChange {
  pub visit_id:         Uuid,
  pub expected_version: u64,
  pub status:           TouristStatus,
  pub at:               DateTime<Utc>,
  pub alert:            Option<NewAlert>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn live_states_can_move_between_each_other() {
    for from in [
      TouristStatus::Active,
      TouristStatus::Suspicious,
      TouristStatus::Emergency,
    ] {
      assert_eq!(
        from.transition(StatusCommand::Flag, "T").unwrap(),
        TouristStatus::Suspicious
      );
      assert_eq!(
        from.transition(StatusCommand::Escalate, "T").unwrap(),
        TouristStatus::Emergency
      );
      assert_eq!(
        from.transition(StatusCommand::Clear, "T").unwrap(),
        TouristStatus::Active
      );
      assert_eq!(
        from.transition(StatusCommand::Return, "T").unwrap(),
        TouristStatus::Returned
      );
    }
  }

  #[test]
  fn returned_is_terminal() {
    let err = TouristStatus::Returned
      .transition(StatusCommand::Return, "T")
      .unwrap_err();
    assert!(matches!(err, Error::AlreadyReturned(_)));

    let err = TouristStatus::Returned
      .transition(StatusCommand::Clear, "T")
      .unwrap_err();
    assert!(matches!(err, Error::Inactive(_)));
  }

  #[test]
  fn returned_is_not_a_command_target() {
    assert!(matches!(
      StatusCommand::toward(TouristStatus::Returned),
      Err(Error::Validation(_))
    ));
    assert_eq!(
      StatusCommand::toward(TouristStatus::Emergency).unwrap(),
      StatusCommand::Escalate
    );
  }

  #[test]
  fn status_strings_round_trip_through_strum() {
    assert_eq!(TouristStatus::Suspicious.as_ref(), "suspicious");
    assert_eq!(
      "emergency".parse::<TouristStatus>().unwrap(),
      TouristStatus::Emergency
    );
    assert_eq!(AlertKind::GeofenceBreach.to_string(), "geofence_breach");
  }
}
