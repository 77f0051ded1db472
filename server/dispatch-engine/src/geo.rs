//! Great-circle distance between two coordinates.

use crate::types::Coordinate;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers on a spherical Earth.
///
/// Inputs are not range-checked: latitudes outside [-90, 90] or longitudes
/// outside [-180, 180] yield a number, just not a meaningful one. Validation
/// happens at the edges (see `normalize`).
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
  let d_lat = (b.latitude - a.latitude).to_radians();
  let d_lng = (b.longitude - a.longitude).to_radians();
  let lat1 = a.latitude.to_radians();
  let lat2 = b.latitude.to_radians();

  let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
  // min guards against h creeping past 1.0 from rounding on antipodal points.
  2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}
