use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{InvalidCoordinate, LocationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// A point on the globe as picked on the map or reported by the device
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
    pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

    /// Create a point, rejecting anything outside valid latitude / longitude ranges
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinate> {
        let point = Self {
            latitude,
            longitude,
        };
        if point.is_valid() {
            Ok(point)
        } else {
            Err(InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        let (min_lat, max_lat) = Self::LATITUDE_RANGE;
        let (min_lng, max_lng) = Self::LONGITUDE_RANGE;
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (min_lat..=max_lat).contains(&self.latitude)
            && (min_lng..=max_lng).contains(&self.longitude)
    }

    /// The last-resort textual form of a point, used whenever no address is known
    pub fn coordinate_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// A human readable address for a point
pub struct ResolvedAddress {
    pub formatted_text: String,
    /// Only set once a reverse geocode attempt for this address has finished
    pub point: Option<GeoPoint>,
}

impl ResolvedAddress {
    /// Placeholder for a point whose reverse geocode hasn't finished yet
    pub fn pending(point: GeoPoint) -> Self {
        Self {
            formatted_text: point.coordinate_text(),
            point: None,
        }
    }

    pub fn fallback(point: GeoPoint) -> Self {
        Self {
            formatted_text: point.coordinate_text(),
            point: Some(point),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.point.is_some()
    }
}

/// Source of the device's current position
pub trait DeviceLocation: Send + Sync {
    fn current_position(&self) -> impl Future<Output = Result<GeoPoint, LocationError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_text_six_places() {
        let point = GeoPoint::new(12.9716, 77.5946).unwrap();
        assert_eq!(point.coordinate_text(), "12.971600, 77.594600");

        let point = GeoPoint::new(-33.8688, -151.2093).unwrap();
        assert_eq!(point.coordinate_text(), "-33.868800, -151.209300");
    }

    #[test]
    fn test_range_validation() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
        assert!(GeoPoint::new(90.5, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.1).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_pending_has_no_point() {
        let point = GeoPoint::new(1.0, 2.0).unwrap();
        let pending = ResolvedAddress::pending(point);
        assert!(!pending.is_resolved());
        assert_eq!(pending.formatted_text, "1.000000, 2.000000");
        assert_eq!(ResolvedAddress::fallback(point).point, Some(point));
    }
}
