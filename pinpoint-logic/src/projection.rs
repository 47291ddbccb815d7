//! Screen position to coordinate translation, used when a click only gives us a pixel offset
//! within the map. Assumes a Web Mercator map with no tilt or rotation.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{error::InvalidCoordinate, location::GeoPoint};

const TILE_SIZE: f64 = 256.0;
/// Latitude where the Mercator world square ends
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: f64,
    /// Size of the map element in pixels
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    fn world_size(&self) -> f64 {
        TILE_SIZE * self.zoom.exp2()
    }

    fn to_world(&self, point: GeoPoint) -> (f64, f64) {
        let world = self.world_size();
        let x = (point.longitude + 180.0) / 360.0 * world;
        let lat = point
            .latitude
            .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
            .to_radians();
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * world;
        (x, y)
    }

    /// Translate a pixel offset from the top left of the map element into a coordinate
    pub fn pixel_to_point(&self, x: f64, y: f64) -> Result<GeoPoint, InvalidCoordinate> {
        let world = self.world_size();
        let (center_x, center_y) = self.to_world(self.center);
        let world_x = center_x + (x - self.width / 2.0);
        let world_y = center_y + (y - self.height / 2.0);

        let longitude = world_x / world * 360.0 - 180.0;
        let latitude = (PI * (1.0 - 2.0 * world_y / world))
            .sinh()
            .atan()
            .to_degrees();

        let in_world = (0.0..=world).contains(&world_x) && (0.0..=world).contains(&world_y);

        if in_world {
            GeoPoint::new(latitude, longitude)
        } else {
            Err(InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(lat: f64, lng: f64, zoom: f64) -> Viewport {
        Viewport {
            center: GeoPoint::new(lat, lng).unwrap(),
            zoom,
            width: 256.0,
            height: 256.0,
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn test_center_pixel_is_center() {
        let vp = viewport(12.9716, 77.5946, 14.0);
        let p = vp.pixel_to_point(128.0, 128.0).unwrap();
        assert_close(p.latitude, 12.9716);
        assert_close(p.longitude, 77.5946);
    }

    #[test]
    fn test_whole_world_edges() {
        let vp = viewport(0.0, 0.0, 0.0);

        let right = vp.pixel_to_point(192.0, 128.0).unwrap();
        assert_close(right.longitude, 90.0);
        assert_close(right.latitude, 0.0);

        let left_edge = vp.pixel_to_point(0.0, 128.0).unwrap();
        assert_close(left_edge.longitude, -180.0);

        let top_edge = vp.pixel_to_point(128.0, 0.0).unwrap();
        assert_close(top_edge.latitude, MAX_MERCATOR_LATITUDE);
    }

    #[test]
    fn test_outside_world_is_invalid() {
        let vp = viewport(0.0, 0.0, 0.0);
        assert!(vp.pixel_to_point(-10.0, 128.0).is_err());
        assert!(vp.pixel_to_point(300.0, 128.0).is_err());
        assert!(vp.pixel_to_point(128.0, -5.0).is_err());
        assert!(vp.pixel_to_point(128.0, 400.0).is_err());
    }

    #[test]
    fn test_north_is_up() {
        let vp = viewport(40.0, -74.0, 10.0);
        let above = vp.pixel_to_point(128.0, 10.0).unwrap();
        let below = vp.pixel_to_point(128.0, 250.0).unwrap();
        assert!(above.latitude > 40.0);
        assert!(below.latitude < 40.0);
    }
}
