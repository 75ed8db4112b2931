//! Tile addressing and bounding boxes.
//!
//! Tiles follow the XYZ scheme: `x` grows eastwards, `y` grows southwards and
//! tile `0/0/0` covers the whole Web Mercator square.

use geo_types::{coord, Rect};

use crate::error::GridError;
use crate::geometry::{mercator_to_lnglat, HALF_WORLD, WORLD_EXTENT};

/// Deepest zoom accepted for tile requests.
pub const MAX_TILE_ZOOM: u8 = 24;

/// A validated tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Validate a tile address.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTile`] when `z` exceeds [`MAX_TILE_ZOOM`] or `x`/`y`
    /// fall outside the `2^z` grid.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, GridError> {
        if z > MAX_TILE_ZOOM {
            return Err(GridError::InvalidTile { z, x, y });
        }
        let tiles_per_side = 1u64 << z;
        if x as u64 >= tiles_per_side || y as u64 >= tiles_per_side {
            return Err(GridError::InvalidTile { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Bounding box of this tile in Web Mercator metres.
    pub fn bounds(&self) -> TileBounds {
        tile_bounds(self.z, self.x, self.y)
    }
}

/// Tile bounding box in EPSG:3857 metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl TileBounds {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// The same box in geographic degrees (EPSG:4326), `x = lng`, `y = lat`.
    pub fn to_lnglat(&self) -> Rect<f64> {
        let (west, south) = mercator_to_lnglat(self.xmin, self.ymin);
        let (east, north) = mercator_to_lnglat(self.xmax, self.ymax);
        Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north })
    }
}

/// Bounding box of tile `z/x/y` in Web Mercator metres.
///
/// No range checking; see [`TileCoord::new`] for validated addresses.
pub fn tile_bounds(z: u8, x: u32, y: u32) -> TileBounds {
    let tile_size = WORLD_EXTENT / 2f64.powi(z as i32);

    let xmin = -HALF_WORLD + x as f64 * tile_size;
    let ymax = HALF_WORLD - y as f64 * tile_size;

    TileBounds {
        xmin,
        ymin: ymax - tile_size,
        xmax: xmin + tile_size,
        ymax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_world_tile() {
        let b = tile_bounds(0, 0, 0);
        assert!(close(b.xmin, -HALF_WORLD));
        assert!(close(b.xmax, HALF_WORLD));
        assert!(close(b.ymin, -HALF_WORLD));
        assert!(close(b.ymax, HALF_WORLD));
        assert!(close(b.xmin + b.xmax, 0.0));
        assert!(close(b.ymin + b.ymax, 0.0));
    }

    #[test]
    fn test_zoom_one_quadrants() {
        let nw = tile_bounds(1, 0, 0);
        assert!(close(nw.xmin, -HALF_WORLD));
        assert!(close(nw.xmax, 0.0));
        assert!(close(nw.ymin, 0.0));
        assert!(close(nw.ymax, HALF_WORLD));

        let se = tile_bounds(1, 1, 1);
        assert!(close(se.xmin, 0.0));
        assert!(close(se.ymax, 0.0));
        assert!(close(se.ymin, -HALF_WORLD));
    }

    #[test]
    fn test_tile_size_halves_per_zoom() {
        for z in 0..10u8 {
            let a = tile_bounds(z, 0, 0);
            let b = tile_bounds(z + 1, 0, 0);
            assert!(close(a.width(), 2.0 * b.width()));
            assert!(close(a.height(), a.width()));
        }
    }

    #[test]
    fn test_tile_coord_validation() {
        assert!(TileCoord::new(0, 0, 0).is_ok());
        assert!(TileCoord::new(3, 7, 7).is_ok());
        assert!(TileCoord::new(24, (1 << 24) - 1, 0).is_ok());

        assert!(matches!(
            TileCoord::new(0, 1, 0),
            Err(GridError::InvalidTile { z: 0, x: 1, y: 0 })
        ));
        assert!(TileCoord::new(3, 0, 8).is_err());
        assert!(TileCoord::new(25, 0, 0).is_err());
    }

    #[test]
    fn test_lnglat_box() {
        let rect = tile_bounds(1, 1, 0).to_lnglat();
        assert!(close(rect.min().x, 0.0));
        assert!(close(rect.max().x, 180.0));
        assert!(close(rect.min().y, 0.0));
        assert!((rect.max().y - 85.0511).abs() < 1e-3);
    }
}
