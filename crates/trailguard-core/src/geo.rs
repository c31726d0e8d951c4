//! Great-circle distance and the bounding box used to prefilter region
//! queries in storage.

use crate::tourist::GeoPoint;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in metres.
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
  let phi1 = a.latitude.to_radians();
  let phi2 = b.latitude.to_radians();
  let d_phi = (b.latitude - a.latitude).to_radians();
  let d_lambda = (b.longitude - a.longitude).to_radians();

  let h = (d_phi / 2.0).sin().powi(2)
    + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// An axis-aligned box in degrees. Always a superset of the circle it was
/// built from; callers refine with [`distance_m`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub min_latitude:  f64,
  pub max_latitude:  f64,
  pub min_longitude: f64,
  pub max_longitude: f64,
}

impl BoundingBox {
  pub fn around(center: GeoPoint, radius_m: f64) -> Self {
    let lat_delta = (radius_m / EARTH_RADIUS_M).to_degrees();
    let min_latitude = (center.latitude - lat_delta).max(-90.0);
    let max_latitude = (center.latitude + lat_delta).min(90.0);

    // Near the poles, or when the box would wrap the antimeridian, fall back
    // to the full longitude range.
    let cos_lat = min_latitude
      .to_radians()
      .cos()
      .min(max_latitude.to_radians().cos());
    let (min_longitude, max_longitude) = if cos_lat < 1e-6 {
      (-180.0, 180.0)
    } else {
      let lng_delta = lat_delta / cos_lat;
      let lo = center.longitude - lng_delta;
      let hi = center.longitude + lng_delta;
      if lo < -180.0 || hi > 180.0 { (-180.0, 180.0) } else { (lo, hi) }
    };

    Self { min_latitude, max_latitude, min_longitude, max_longitude }
  }

  pub fn contains(&self, p: GeoPoint) -> bool {
    (self.min_latitude..=self.max_latitude).contains(&p.latitude)
      && (self.min_longitude..=self.max_longitude).contains(&p.longitude)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pt(latitude: f64, longitude: f64) -> GeoPoint { GeoPoint { latitude, longitude } }

  #[test]
  fn one_degree_of_latitude_is_about_111_km() {
    let d = distance_m(pt(0.0, 0.0), pt(1.0, 0.0));
    assert!((d - 111_195.0).abs() < 50.0, "got {d}");
  }

  #[test]
  fn distance_is_symmetric_and_zero_at_same_point() {
    let a = pt(27.1751, 78.0421);
    let b = pt(28.6139, 77.2090);
    assert_eq!(distance_m(a, a), 0.0);
    assert!((distance_m(a, b) - distance_m(b, a)).abs() < 1e-6);
  }

  #[test]
  fn box_contains_points_inside_radius() {
    let center = pt(10.0, 20.0);
    let bbox = BoundingBox::around(center, 5_000.0);
    assert!(bbox.contains(pt(10.03, 20.03)));
    assert!(!bbox.contains(pt(10.2, 20.0)));
  }

  #[test]
  fn box_widens_near_antimeridian() {
    let bbox = BoundingBox::around(pt(0.0, 179.99), 10_000.0);
    assert_eq!(bbox.min_longitude, -180.0);
    assert_eq!(bbox.max_longitude, 180.0);
  }
}
