use serde::{Deserialize, Serialize};

use crate::{constants::MAX_ACCEPTED_ACCURACY_M, MapError, Result};

/// Mean earth radius used for distance calculations
const EARTH_RADIUS: f64 = 6378137.0;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(rename = "latitude", alias = "lat")]
    pub lat: f64,
    #[serde(rename = "longitude", alias = "lng")]
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Like [`LatLng::is_valid`] but reports what was wrong
    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(MapError::InvalidCoordinates(format!(
                "({}, {}) is outside [-90,90] x [-180,180]",
                self.lat, self.lng
            )))
        }
    }

    /// Calculates the distance to another LatLng using the Haversine formula
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS * c
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Validates a raw location fix: coordinate in range and accuracy in
/// `[0, MAX_ACCEPTED_ACCURACY_M]`. NaN anywhere fails.
pub fn validate_fix(lat: f64, lng: f64, accuracy: f64) -> Result<()> {
    LatLng::new(lat, lng).validate()?;
    if !(0.0..=MAX_ACCEPTED_ACCURACY_M).contains(&accuracy) {
        return Err(MapError::LocationFailed(format!(
            "accuracy {accuracy} m outside [0, {MAX_ACCEPTED_ACCURACY_M}]"
        )));
    }
    Ok(())
}

/// Represents a bounding box of geographical coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Bounds spanning `lat_delta` x `lng_delta` degrees around `center`
    pub fn from_center_span(center: LatLng, lat_delta: f64, lng_delta: f64) -> Self {
        let half_lat = lat_delta.abs() / 2.0;
        let half_lng = lng_delta.abs() / 2.0;
        Self::new(
            LatLng::new((center.lat - half_lat).max(-90.0), (center.lng - half_lng).max(-180.0)),
            LatLng::new((center.lat + half_lat).min(90.0), (center.lng + half_lng).min(180.0)),
        )
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlng_validation() {
        assert!(LatLng::new(39.9, 116.4).is_valid());
        assert!(LatLng::new(90.0, -180.0).is_valid());
        assert!(!LatLng::new(100.0, 0.0).is_valid());
        assert!(!LatLng::new(0.0, 180.5).is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_distance_calculation() {
        let beijing = LatLng::new(39.9042, 116.4074);
        let shanghai = LatLng::new(31.2304, 121.4737);
        let distance = beijing.distance_to(&shanghai);
        // roughly 1067 km
        assert!((distance - 1_067_000.0).abs() < 15_000.0);
    }

    #[test]
    fn test_validate_fix() {
        assert!(validate_fix(39.9, 116.4, 15.0).is_ok());
        assert!(validate_fix(39.9, 116.4, 10_000.0).is_ok());
        assert!(matches!(
            validate_fix(100.0, 116.4, 15.0),
            Err(MapError::InvalidCoordinates(_))
        ));
        assert!(matches!(
            validate_fix(39.9, 116.4, 10_000.5),
            Err(MapError::LocationFailed(_))
        ));
        assert!(validate_fix(39.9, 116.4, -1.0).is_err());
        assert!(validate_fix(39.9, 116.4, f64::NAN).is_err());
    }

    #[test]
    fn test_bounds_from_center_span() {
        let bounds = LatLngBounds::from_center_span(LatLng::new(39.9, 116.4), 0.2, 0.4);
        assert!((bounds.south_west.lat - 39.8).abs() < 1e-9);
        assert!((bounds.north_east.lng - 116.6).abs() < 1e-9);
        assert!(bounds.contains(&LatLng::new(39.9, 116.4)));
        let center = bounds.center();
        assert!((center.lat - 39.9).abs() < 1e-9);
    }

    #[test]
    fn test_latlng_serializes_with_long_names() {
        let json = serde_json::to_value(LatLng::new(1.5, 2.5)).unwrap();
        assert_eq!(json["latitude"], 1.5);
        assert_eq!(json["longitude"], 2.5);
        let parsed: LatLng = serde_json::from_str(r#"{"lat": 3.0, "lng": 4.0}"#).unwrap();
        assert_eq!(parsed, LatLng::new(3.0, 4.0));
    }
}
