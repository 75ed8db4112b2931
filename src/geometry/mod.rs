//! Geometry helpers shared by the tessellator, the datastores and the tile layer.
//!
//! - [`BoundaryGeometry`]: Polygon/MultiPolygon boundary parsed from GeoJSON
//! - [`polygon_to_geojson`] / [`polygon_to_wkt`]: cell polygon writers
//! - [`mercator`]: spherical Web Mercator projection used for tile math

mod geojson;
pub mod mercator;

pub use geojson::{multi_polygon_to_geojson, polygon_to_geojson, polygon_to_wkt, BoundaryGeometry};
pub use mercator::{lnglat_to_mercator, mercator_to_lnglat, HALF_WORLD, WORLD_EXTENT};
