//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in miles
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Haversine distance between two points in miles
pub fn haversine_miles(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_MILES * c
}

/// Straight-line length of a waypoint sequence in miles
pub fn polyline_miles(waypoints: &[Coordinates]) -> f64 {
    waypoints
        .windows(2)
        .map(|pair| haversine_miles(&pair[0], &pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn los_angeles() -> Coordinates {
        Coordinates {
            lat: 34.0522,
            lng: -118.2437,
        }
    }

    fn phoenix() -> Coordinates {
        Coordinates {
            lat: 33.4484,
            lng: -112.0740,
        }
    }

    fn dallas() -> Coordinates {
        Coordinates {
            lat: 32.7767,
            lng: -96.7970,
        }
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        let d = haversine_miles(&los_angeles(), &los_angeles());
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn haversine_la_to_phoenix_is_about_357_miles() {
        let d = haversine_miles(&los_angeles(), &phoenix());
        assert!(d > 340.0 && d < 380.0, "got {} miles", d);
    }

    #[test]
    fn haversine_is_symmetric() {
        let ab = haversine_miles(&phoenix(), &dallas());
        let ba = haversine_miles(&dallas(), &phoenix());
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn polyline_sums_consecutive_legs() {
        let points = [los_angeles(), phoenix(), dallas()];
        let total = polyline_miles(&points);
        let legs = haversine_miles(&points[0], &points[1]) + haversine_miles(&points[1], &points[2]);
        assert!((total - legs).abs() < 1e-9);
        assert!(total > 1100.0 && total < 1300.0, "got {} miles", total);
    }
}
