//! Mapbox vector tile encoder for grid cells.
//!
//! Cells are projected to Web Mercator, scaled into the tile's integer grid,
//! clipped to the tile plus a buffer and written as polygon features of a
//! single layer.
//!
//! # Design Decisions
//!
//! - **Clipping**: rings entirely inside the buffered square are kept as
//!   they are; the rest are intersected with it using `geo`'s boolean ops.
//!
//! - **Null properties are omitted**: vector tiles have no null value; a cell
//!   without an area simply has no `area_id` tag.

use bytes::Bytes;
use geo::{BooleanOps, BoundingRect};
use geo_types::{coord, LineString, Polygon, Rect};
use mvt::{GeomEncoder, GeomType, Tile};

use crate::error::StoreError;
use crate::geometry::lnglat_to_mercator;
use crate::store::CellRecord;

use super::bounds::TileBounds;

/// Name of the single layer in every grid tile.
pub const LAYER_NAME: &str = "h3-layer";

/// Tile coordinate extent.
pub const TILE_EXTENT: u32 = 4096;

/// Clip buffer around the tile, in tile units.
pub const TILE_BUFFER: u32 = 64;

// =============================================================================
// MVT Encoder
// =============================================================================

/// Encoder for grid-cell vector tiles.
#[derive(Debug, Clone)]
pub struct MvtTileEncoder {
    extent: u32,
    buffer: u32,
}

impl Default for MvtTileEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MvtTileEncoder {
    /// Encoder with the standard extent (4096) and buffer (64).
    pub fn new() -> Self {
        Self {
            extent: TILE_EXTENT,
            buffer: TILE_BUFFER,
        }
    }

    /// Encode `cells` into a tile covering `bounds`.
    ///
    /// Returns `None` when no cell leaves a drawable ring inside the buffered
    /// tile.
    ///
    /// # Errors
    ///
    /// [`StoreError::Encode`] if the protobuf writer rejects a geometry.
    pub fn encode(
        &self,
        cells: &[CellRecord],
        bounds: &TileBounds,
    ) -> Result<Option<Bytes>, StoreError> {
        let extent = self.extent as f64;
        let buffer = self.buffer as f64;

        let mut tile = Tile::new(self.extent);
        let mut layer = tile.create_layer(LAYER_NAME);
        let mut features = 0usize;

        for cell in cells {
            let ring: LineString<f64> = cell
                .boundary
                .exterior()
                .coords()
                .map(|c| project_to_tile(c.x, c.y, bounds, extent))
                .collect();

            for clipped in clip_to_buffer(ring, extent, buffer) {
                let ring = clean_ring(clipped.coords().map(|c| (c.x, c.y)).collect());
                if ring.len() < 3 {
                    continue;
                }

                let mut encoder = GeomEncoder::new(GeomType::Polygon);
                for (x, y) in ring {
                    encoder = encoder.point(x, y).map_err(encode_error)?;
                }
                let geometry = encoder
                    .complete()
                    .and_then(|e| e.encode())
                    .map_err(encode_error)?;

                let mut feature = layer.into_feature(geometry);
                feature.add_tag_string("h3_index", &cell.h3_index);
                if let Some(area_id) = cell.area_id {
                    feature.add_tag_string("area_id", &area_id.to_string());
                }
                layer = feature.into_layer();
                features += 1;
            }
        }

        if features == 0 {
            return Ok(None);
        }

        tile.add_layer(layer).map_err(encode_error)?;
        let data = tile.to_bytes().map_err(encode_error)?;
        Ok(Some(Bytes::from(data)))
    }
}

fn encode_error(e: mvt::Error) -> StoreError {
    StoreError::Encode(e.to_string())
}

/// Geographic position to tile units; `y` points down.
fn project_to_tile(lng: f64, lat: f64, bounds: &TileBounds, extent: f64) -> (f64, f64) {
    let (mx, my) = lnglat_to_mercator(lng, lat);
    let x = (mx - bounds.xmin) / bounds.width() * extent;
    let y = (bounds.ymax - my) / bounds.height() * extent;
    (x, y)
}

// =============================================================================
// Clipping
// =============================================================================

/// Clip a ring to `[-buffer, extent + buffer]` on both axes.
///
/// Returns the exterior rings of the pieces left inside, possibly none.
fn clip_to_buffer(ring: LineString<f64>, extent: f64, buffer: f64) -> Vec<LineString<f64>> {
    let clip = Rect::new(
        coord! { x: -buffer, y: -buffer },
        coord! { x: extent + buffer, y: extent + buffer },
    );
    let polygon = Polygon::new(ring, Vec::new());

    let Some(bbox) = polygon.bounding_rect() else {
        return Vec::new();
    };
    let inside = bbox.min().x >= clip.min().x
        && bbox.min().y >= clip.min().y
        && bbox.max().x <= clip.max().x
        && bbox.max().y <= clip.max().y;
    if inside {
        return vec![polygon.into_inner().0];
    }

    polygon
        .intersection(&clip.to_polygon())
        .into_iter()
        .map(|piece| piece.into_inner().0)
        .collect()
}

/// Snap to the integer grid and drop repeated points, including the closing one.
fn clean_ring(ring: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut cleaned: Vec<(f64, f64)> = Vec::with_capacity(ring.len());
    for (x, y) in ring {
        let point = (x.round(), y.round());
        if cleaned.last() != Some(&point) {
            cleaned.push(point);
        }
    }
    while cleaned.len() > 1 && cleaned.first() == cleaned.last() {
        cleaned.pop();
    }
    cleaned
}
