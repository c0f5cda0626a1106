//! Spherical Mercator quadtiles used as map/reduce grouping keys.
//!
//! Every point is emitted under the tile containing it plus the three tiles
//! toward increasing column and row. Two points closer than one tile width
//! therefore always share at least one key, even across a tile edge.

use crate::error::ConfigError;
use crate::models::AddressRecord;
use std::f64::consts::PI;
use std::fmt;

/// Web Mercator sphere radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;
pub const CIRCUMFERENCE_M: f64 = 2.0 * PI * EARTH_RADIUS_M;
/// Largest |x| or |y| a projected point may have.
pub const HALF_EXTENT_M: f64 = CIRCUMFERENCE_M / 2.0;
/// Imported latitudes beyond this are dropped; projected y stays inside the grid.
pub const MAX_LATITUDE: f64 = 85.05;
pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 30;

/// Project WGS84 degrees to spherical Mercator meters.
pub fn project(lon: f64, lat: f64) -> (f64, f64) {
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Whether `v` lies on the projected Mercator square, allowing for rounding
/// at the antimeridian.
pub fn in_extent(v: f64) -> bool {
    v.is_finite() && v.abs() <= HALF_EXTENT_M + 1e-6
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub zoom: u8,
    pub col: i64,
    pub row: i64,
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Assigns grouping keys to a record for the map phase.
pub trait KeyAssigner {
    fn keys(&self, record: &AddressRecord) -> Vec<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct QuadtileAssigner {
    zoom: u8,
}

impl QuadtileAssigner {
    pub fn new(zoom: u8) -> Result<Self, ConfigError> {
        validate_zoom(zoom)?;
        Ok(Self { zoom })
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn tiles_for(&self, x: f64, y: f64) -> [TileKey; 4] {
        tiles_for(x, y, self.zoom)
    }
}

impl KeyAssigner for QuadtileAssigner {
    fn keys(&self, record: &AddressRecord) -> Vec<String> {
        self.tiles_for(record.x, record.y)
            .iter()
            .map(TileKey::to_string)
            .collect()
    }
}

pub fn validate_zoom(zoom: u8) -> Result<(), ConfigError> {
    if (MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "tiling.zoom",
            reason: format!("{} not in {}..={}", zoom, MIN_ZOOM, MAX_ZOOM),
        })
    }
}

/// The tile holding `(x, y)` and its neighbors at `col + 1`, `row + 1` and both.
/// Both coordinates must satisfy [`in_extent`].
pub fn tiles_for(x: f64, y: f64, zoom: u8) -> [TileKey; 4] {
    let factor = 2f64.powi(zoom as i32);
    let row0 = 0.5 - y / CIRCUMFERENCE_M;
    let col0 = 0.5 + x / CIRCUMFERENCE_M;
    let row = (row0 * factor).floor() as i64;
    let col = (col0 * factor).floor() as i64;
    let key = |col, row| TileKey { zoom, col, row };
    [
        key(col, row),
        key(col + 1, row),
        key(col, row + 1),
        key(col + 1, row + 1),
    ]
}
