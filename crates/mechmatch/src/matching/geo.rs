use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;
/// Mean Earth radius in meters, used for fine-grained arrival checks.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Output unit for [`great_circle_distance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    /// Kilometers, rounded to two decimals for presentation.
    Kilometers,
    /// Raw meters, kept unrounded so arrival detection keeps its precision.
    Meters,
}

/// Haversine great-circle distance between two points.
///
/// Coordinates outside the usual [-90, 90] / [-180, 180] ranges are not
/// rejected; validating them is the caller's responsibility.
pub fn great_circle_distance(from: Coordinates, to: Coordinates, unit: DistanceUnit) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    match unit {
        DistanceUnit::Kilometers => round_to(EARTH_RADIUS_KM * c, 2),
        DistanceUnit::Meters => EARTH_RADIUS_M * c,
    }
}

/// Round half away from zero to a fixed number of decimal places.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAIRO_DRIVER: Coordinates = Coordinates::new(30.0444, 31.2357);
    const CAIRO_WORKSHOP: Coordinates = Coordinates::new(30.0500, 31.2400);

    #[test]
    fn distance_is_symmetric() {
        let there = great_circle_distance(CAIRO_DRIVER, CAIRO_WORKSHOP, DistanceUnit::Kilometers);
        let back = great_circle_distance(CAIRO_WORKSHOP, CAIRO_DRIVER, DistanceUnit::Kilometers);
        assert_eq!(there, back);

        let there_m = great_circle_distance(CAIRO_DRIVER, CAIRO_WORKSHOP, DistanceUnit::Meters);
        let back_m = great_circle_distance(CAIRO_WORKSHOP, CAIRO_DRIVER, DistanceUnit::Meters);
        assert!((there_m - back_m).abs() < 1e-9);
    }

    #[test]
    fn distance_is_zero_at_identity() {
        assert_eq!(
            great_circle_distance(CAIRO_DRIVER, CAIRO_DRIVER, DistanceUnit::Kilometers),
            0.0
        );
        assert_eq!(
            great_circle_distance(CAIRO_DRIVER, CAIRO_DRIVER, DistanceUnit::Meters),
            0.0
        );
    }

    #[test]
    fn short_cairo_hop_is_under_a_kilometer() {
        let km = great_circle_distance(CAIRO_DRIVER, CAIRO_WORKSHOP, DistanceUnit::Kilometers);
        assert!((0.6..0.9).contains(&km), "unexpected distance {km}");
        // Kilometer output is rounded to two decimals.
        assert_eq!(km, round_to(km, 2));
    }

    #[test]
    fn meter_output_is_not_rounded() {
        let meters = great_circle_distance(CAIRO_DRIVER, CAIRO_WORKSHOP, DistanceUnit::Meters);
        let km = great_circle_distance(CAIRO_DRIVER, CAIRO_WORKSHOP, DistanceUnit::Kilometers);
        assert!((meters / 1000.0 - km).abs() < 0.005);
        assert_ne!(meters, round_to(meters, 2));
    }

    #[test]
    fn known_city_pair_distance() {
        // Cairo to Alexandria is roughly 180 km as the crow flies.
        let cairo = Coordinates::new(30.0444, 31.2357);
        let alexandria = Coordinates::new(31.2001, 29.9187);
        let km = great_circle_distance(cairo, alexandria, DistanceUnit::Kilometers);
        assert!((170.0..190.0).contains(&km), "unexpected distance {km}");
    }
}
