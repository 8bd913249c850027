//! Great-circle distance on the WGS84 sphere.

use telemetry::Coordinate;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two coordinates in kilometres. Symmetric, zero
/// for identical points, no ellipsoid correction.
#[must_use]
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::distance_km;
    use telemetry::Coordinate;

    const fn point(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate { latitude, longitude }
    }

    #[test]
    fn identical_points_are_zero() {
        let auckland = point(-36.8485, 174.7633);
        assert!(distance_km(auckland, auckland).abs() < f64::EPSILON);
    }

    #[test]
    fn symmetric() {
        let a = point(-36.8485, 174.7633);
        let b = point(-37.7870, 175.2793);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn quarter_great_circle() {
        let distance = distance_km(point(0.0, 0.0), point(0.0, 90.0));
        let expected = 10_007.5;
        assert!(
            (distance - expected).abs() / expected < 0.01,
            "expected ~{expected} km, got {distance}"
        );
    }

    #[test]
    fn auckland_to_hamilton() {
        // ~115 km by great circle
        let distance = distance_km(point(-36.8485, 174.7633), point(-37.7870, 175.2793));
        assert!((100.0..130.0).contains(&distance), "got {distance}");
    }
}
