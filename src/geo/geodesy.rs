use crate::foundation::core::Coordinate;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine great-circle distance in meters.
///
/// Symmetric and zero for identical inputs. Non-finite inputs yield `0.0`.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push `h` slightly outside [0, 1] for antipodal or identical points.
    let h = h.clamp(0.0, 1.0);
    let d = 2.0 * EARTH_RADIUS_M * h.sqrt().asin();
    if d.is_finite() { d } else { 0.0 }
}

/// Forward azimuth from `from` to `to`, in degrees `[0, 360)`, 0 = north, clockwise.
///
/// Coincident points have no direction; by convention this returns `0.0`, as it does for
/// non-finite inputs. Longitude differences wrap across the antimeridian.
pub fn initial_bearing_degrees(from: Coordinate, to: Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlng = (to.lng - from.lng).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    if !x.is_finite() || !y.is_finite() || (x == 0.0 && y == 0.0) {
        return 0.0;
    }
    normalize_heading(y.atan2(x).to_degrees())
}

/// Wrap any finite angle into `[0, 360)`; non-finite input maps to `0.0`.
pub fn normalize_heading(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let h = deg.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs, and -0.0 for -0.0.
    if h >= 360.0 { 0.0 } else { h.abs() }
}

#[cfg(test)]
#[path = "../../tests/unit/geo/geodesy.rs"]
mod tests;
