//! Input checks applied before anything reaches the store.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  location::LocationSample,
  tourist::GeoPoint,
};

/// Device clocks may drift ahead of the server by at most this much.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(5 * 60);

/// Blockchain IDs are opaque tokens: 3–128 ASCII letters, digits, `-` or `_`.
pub fn blockchain_id(id: &str) -> Result<()> {
  let len = id.chars().count();
  if !(3..=128).contains(&len) {
    return Err(Error::Validation(format!(
      "blockchainId must be 3-128 characters, got {len}"
    )));
  }
  if let Some(bad) = id
    .chars()
    .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_')))
  {
    return Err(Error::Validation(format!(
      "blockchainId contains invalid character {bad:?}"
    )));
  }
  Ok(())
}

/// Loose E.164: optional leading `+`, then 4–15 digits. Spaces, dashes and
/// parentheses are tolerated as separators.
pub fn phone_number(number: &str) -> Result<()> {
  let trimmed = number.trim();
  let body = trimmed.strip_prefix('+').unwrap_or(trimmed);

  let mut digits = 0usize;
  for c in body.chars() {
    match c {
      '0'..='9' => digits += 1,
      ' ' | '-' | '(' | ')' => {}
      other => {
        return Err(Error::Validation(format!(
          "phoneNumber contains invalid character {other:?}"
        )));
      }
    }
  }

  if !(4..=15).contains(&digits) {
    return Err(Error::Validation(format!(
      "phoneNumber must have 4-15 digits, got {digits}"
    )));
  }
  Ok(())
}

pub fn point(p: GeoPoint) -> Result<()> {
  if !p.latitude.is_finite() || p.latitude.abs() > 90.0 {
    return Err(Error::Validation(format!(
      "latitude {} outside [-90, 90]",
      p.latitude
    )));
  }
  if !p.longitude.is_finite() || p.longitude.abs() > 180.0 {
    return Err(Error::Validation(format!(
      "longitude {} outside [-180, 180]",
      p.longitude
    )));
  }
  Ok(())
}

fn non_negative(name: &str, value: Option<f64>) -> Result<()> {
  match value {
    Some(v) if !v.is_finite() || v < 0.0 => Err(Error::Validation(format!(
      "{name} must be a non-negative number, got {v}"
    ))),
    _ => Ok(()),
  }
}

/// Reject physically implausible samples. `now` is the server arrival time.
pub fn sample(s: &LocationSample, now: DateTime<Utc>) -> Result<()> {
  point(s.point())?;
  non_negative("accuracy", s.accuracy)?;
  non_negative("speed", s.speed)?;

  if let Some(h) = s.heading
    && (!h.is_finite() || !(0.0..360.0).contains(&h))
  {
    return Err(Error::Validation(format!(
      "heading {h} outside [0, 360)"
    )));
  }
  if let Some(a) = s.altitude
    && !a.is_finite()
  {
    return Err(Error::Validation("altitude must be finite".into()));
  }

  if let Some(at) = s.recorded_at
    && (at - now).to_std().is_ok_and(|ahead| ahead > MAX_CLOCK_SKEW)
  {
    return Err(Error::Validation(format!(
      "recordedAt {at} is too far in the future"
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::TimeDelta;

  use super::*;

  #[test]
  fn blockchain_ids() {
    assert!(blockchain_id("TID-1").is_ok());
    assert!(blockchain_id("0xabc123_card-9").is_ok());
    assert!(blockchain_id("0xabc123:card_9").is_err());
    assert!(blockchain_id("tid.1").is_err());
    assert!(blockchain_id("ab").is_err());
    assert!(blockchain_id("has space").is_err());
    assert!(blockchain_id(&"x".repeat(129)).is_err());
  }

  #[test]
  fn phone_numbers() {
    assert!(phone_number("+1555").is_ok());
    assert!(phone_number("+91 98765-43210").is_ok());
    assert!(phone_number("(555) 010-9999").is_ok());
    assert!(phone_number("12").is_err());
    assert!(phone_number("+1555abc").is_err());
    assert!(phone_number("1234567890123456").is_err());
  }

  #[test]
  fn coordinates_out_of_range_are_rejected() {
    let bad_lat = GeoPoint { latitude: 91.0, longitude: 0.0 };
    let bad_lng = GeoPoint { latitude: 0.0, longitude: 200.0 };
    let nan = GeoPoint { latitude: f64::NAN, longitude: 0.0 };
    assert!(matches!(point(bad_lat), Err(Error::Validation(_))));
    assert!(matches!(point(bad_lng), Err(Error::Validation(_))));
    assert!(matches!(point(nan), Err(Error::Validation(_))));
    assert!(point(GeoPoint { latitude: -90.0, longitude: 180.0 }).is_ok());
  }

  #[test]
  fn sample_metadata_checks() {
    let now = Utc::now();
    let mut s = LocationSample::at(10.0, 20.0);
    s.heading = Some(360.0);
    assert!(sample(&s, now).is_err());

    s.heading = Some(359.9);
    s.speed = Some(-1.0);
    assert!(sample(&s, now).is_err());

    s.speed = Some(3.0);
    s.accuracy = Some(12.5);
    assert!(sample(&s, now).is_ok());
  }

  #[test]
  fn future_timestamps_beyond_skew_are_rejected() {
    let now = Utc::now();
    let near = LocationSample::at(1.0, 1.0).recorded(now + TimeDelta::seconds(60));
    let far = LocationSample::at(1.0, 1.0).recorded(now + TimeDelta::minutes(10));
    let past = LocationSample::at(1.0, 1.0).recorded(now - TimeDelta::days(1));
    assert!(sample(&near, now).is_ok());
    assert!(sample(&far, now).is_err());
    assert!(sample(&past, now).is_ok());
  }
}
