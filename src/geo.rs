use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Pixel size of one map tile; the world is `TILE_SIZE * 2^zoom` pixels wide.
pub const TILE_SIZE: f64 = 256.0;

const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// True when both axes differ by less than `epsilon` degrees.
    pub fn is_within(&self, other: &LatLng, epsilon: f64) -> bool {
        (self.latitude - other.latitude).abs() < epsilon
            && (self.longitude - other.longitude).abs() < epsilon
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub const WORLD: BoundingBox = BoundingBox {
        north: 90.0,
        south: -90.0,
        east: 180.0,
        west: -180.0,
    };

    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Bounds of a `width` x `height` pixel window centered on `center` at `zoom`.
    pub fn around(center: LatLng, zoom: f64, width: f64, height: f64) -> Self {
        let world = TILE_SIZE * 2f64.powf(zoom);
        let cx = lng_x(center.longitude) * world;
        let cy = lat_y(center.latitude) * world;
        let half_w = width / 2.0;
        let half_h = height / 2.0;

        Self {
            north: y_lat(((cy - half_h) / world).clamp(0.0, 1.0)),
            south: y_lat(((cy + half_h) / world).clamp(0.0, 1.0)),
            east: x_lng((cx + half_w) / world).min(180.0),
            west: x_lng((cx - half_w) / world).max(-180.0),
        }
    }

    pub fn contains(&self, point: &LatLng) -> bool {
        let in_lat = point.latitude >= self.south && point.latitude <= self.north;
        let in_lng = if self.west <= self.east {
            point.longitude >= self.west && point.longitude <= self.east
        } else {
            point.longitude >= self.west || point.longitude <= self.east
        };

        in_lat && in_lng
    }
}

/// Web-Mercator projection of a longitude onto `[0, 1]`.
pub(crate) fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Web-Mercator projection of a latitude onto `[0, 1]`, top to bottom.
pub(crate) fn lat_y(lat: f64) -> f64 {
    let sin = (lat.clamp(-MAX_LATITUDE, MAX_LATITUDE) * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;

    y.clamp(0.0, 1.0)
}

pub(crate) fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

pub(crate) fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;

    360.0 * y2.exp().atan() / PI - 90.0
}
