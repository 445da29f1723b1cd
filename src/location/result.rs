use serde::{Deserialize, Serialize};

use crate::{
    core::{
        config::CoordinateSystem,
        geo::{validate_fix, LatLng},
    },
    Result,
};

/// GPS fix type code reported for satellite fixes
pub const LOC_TYPE_GPS: i32 = 61;

/// A location fix that passed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResult {
    #[serde(flatten)]
    pub coordinate: LatLng,
    pub accuracy: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default, rename = "direction")]
    pub heading: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub street_number: Option<String>,
    #[serde(default)]
    pub location_describe: Option<String>,
    #[serde(default, rename = "coordinateType")]
    pub coordinate_system: CoordinateSystem,
    #[serde(default)]
    pub loc_type: i32,
    pub timestamp: u64,
}

impl LocationResult {
    /// A bare fix without address data
    pub fn new(coordinate: LatLng, accuracy: f64, timestamp: u64) -> Self {
        Self {
            coordinate,
            accuracy,
            altitude: None,
            speed: None,
            heading: None,
            address: None,
            province: None,
            city: None,
            district: None,
            street: None,
            street_number: None,
            location_describe: None,
            coordinate_system: CoordinateSystem::default(),
            loc_type: LOC_TYPE_GPS,
            timestamp,
        }
    }

    /// Re-checks coordinate range and accuracy ceiling
    pub fn validate(&self) -> Result<()> {
        validate_fix(self.coordinate.lat, self.coordinate.lng, self.accuracy)
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }
}

/// A sample straight from a [`crate::traits::LocationSource`], not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct RawLocation {
    fix: LocationResult,
}

impl RawLocation {
    pub fn new(fix: LocationResult) -> Self {
        Self { fix }
    }

    /// Shorthand for a sample with only coordinate and accuracy
    pub fn at(lat: f64, lng: f64, accuracy: f64, timestamp: u64) -> Self {
        Self::new(LocationResult::new(LatLng::new(lat, lng), accuracy, timestamp))
    }

    pub fn fix(&self) -> &LocationResult {
        &self.fix
    }

    /// Accepts the sample if it is in range and accurate enough
    pub fn validate(self) -> Result<LocationResult> {
        self.fix.validate()?;
        Ok(self.fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_location_validation() {
        assert!(RawLocation::at(39.9, 116.4, 12.0, 0).validate().is_ok());
        assert!(RawLocation::at(100.0, 116.4, 12.0, 0).validate().is_err());
        assert!(RawLocation::at(39.9, 116.4, 20_000.0, 0).validate().is_err());
        assert!(RawLocation::at(39.9, 116.4, -0.5, 0).validate().is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let mut fix = LocationResult::new(LatLng::new(39.9, 116.4), 12.5, 1_700_000_000_000);
        fix.street_number = Some("1".into());
        let json = serde_json::to_value(&fix).unwrap();
        assert_eq!(json["latitude"], 39.9);
        assert_eq!(json["longitude"], 116.4);
        assert_eq!(json["coordinateType"], "bd09ll");
        assert_eq!(json["streetNumber"], "1");
        assert_eq!(json["locType"], 61);

        let back: LocationResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, fix);
    }

    #[test]
    fn test_age() {
        let fix = LocationResult::new(LatLng::new(0.0, 0.0), 1.0, 1_000);
        assert_eq!(fix.age_ms(31_000), 30_000);
        assert_eq!(fix.age_ms(500), 0);
    }
}
