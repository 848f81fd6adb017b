//! Geographic to web-mercator tile projection.
//!
//! Tiles follow the standard slippy-map pyramid: origin at the top-left,
//! `2^z` tiles per axis at zoom `z`.

use std::f64::consts::PI;

use serde::Serialize;

/// Highest zoom level accepted by the gateway.
pub const MAX_ZOOM: u8 = 18;

/// Tile address in the web-mercator pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileCoordinate {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

/// Number of tiles along one axis at `zoom`.
pub fn tiles_per_axis(zoom: u8) -> u32 {
    1u32 << u32::from(zoom)
}

/// Project a latitude/longitude pair onto the tile grid at `zoom`.
///
/// Inputs at the poles or on the antimeridian fall outside the open mercator
/// domain; their indices are clamped into `[0, 2^zoom)`.
pub fn project(lat: f64, lng: f64, zoom: u8) -> TileCoordinate {
    let n = f64::from(tiles_per_axis(zoom));
    let x = ((lng + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - lat.to_radians().tan().asinh() / PI) / 2.0 * n).floor();

    TileCoordinate {
        x: clamp_index(x, n),
        y: clamp_index(y, n),
        z: zoom,
    }
}

fn clamp_index(value: f64, n: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, n - 1.0) as u32
}
