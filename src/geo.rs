//! H3-cell-to-point conversion and great-circle distance.

use crate::model::GeoPoint;
use std::str::FromStr;

/// Converts a hex-encoded H3 cell index to a GeoJSON point. Returns a
/// null-coordinate point on any parse failure.
pub fn h3_hex_to_point(location_hex: &str) -> GeoPoint {
    match h3o::CellIndex::from_str(location_hex) {
        Ok(cell) => {
            let center: h3o::LatLng = h3o::LatLng::from(cell);
            GeoPoint::new(center.lng(), center.lat())
        }
        Err(_) => GeoPoint::null(),
    }
}

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle (haversine) distance in meters between two GeoJSON points,
/// used as the witness-subgraph edge weight in graph analytics. Returns `None` if either point's coordinates are null.
pub fn haversine_distance_m(a: &GeoPoint, b: &GeoPoint) -> Option<f64> {
    let [lon1, lat1] = a.coordinates?;
    let [lon2, lat2] = b.coordinates?;

    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().asin();

    Some(EARTH_RADIUS_M * c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_h3_hex_yields_null_point() {
        let point = h3_hex_to_point("not-a-cell");
        assert_eq!(point.coordinates, None);
    }

    #[test]
    fn haversine_distance_zero_for_identical_points() {
        let a = GeoPoint::new(-122.4194, 37.7749);
        assert_eq!(haversine_distance_m(&a, &a), Some(0.0));
    }

    #[test]
    fn haversine_distance_sf_to_nyc_is_roughly_correct() {
        let sf = GeoPoint::new(-122.4194, 37.7749);
        let nyc = GeoPoint::new(-74.0060, 40.7128);
        let distance = haversine_distance_m(&sf, &nyc).unwrap();
        // Accepted great-circle distance is ~4129 km.
        assert!((distance - 4_129_000.0).abs() < 50_000.0, "got {distance}");
    }

    #[test]
    fn haversine_distance_is_none_for_null_coordinates() {
        let a = GeoPoint::null();
        let b = GeoPoint::new(0.0, 0.0);
        assert_eq!(haversine_distance_m(&a, &b), None);
    }
}
