//! Polygon tessellation into H3 cells.
//!
//! Boundaries are GeoJSON-ordered (`x = lng`, `y = lat`). Each sub-polygon of
//! a boundary is tiled on its own; a sub-polygon the grid library rejects is
//! logged and skipped so one malformed ring never sinks a whole area.
//!
//! Cell membership follows centroid containment: a cell is part of the
//! tessellation when its center lies inside the polygon.

use std::collections::BTreeSet;

use geo_types::{Coord, LineString, Polygon};
use h3o::geom::{ContainmentMode, TilerBuilder};
use h3o::{CellIndex, Resolution};
use tracing::warn;

use crate::error::GeometryError;
use crate::geometry::BoundaryGeometry;

/// Cover `geometry` with cells at `resolution`.
///
/// Returns an ordered set so repeated runs over the same input produce
/// identical sequences. Sub-polygons that fail are skipped; the union of the
/// others is returned, possibly empty.
pub fn tessellate(geometry: &BoundaryGeometry, resolution: Resolution) -> BTreeSet<CellIndex> {
    let mut cells = BTreeSet::new();

    for (index, polygon) in geometry.polygons().iter().enumerate() {
        match tessellate_polygon(polygon, resolution) {
            Ok(found) => cells.extend(found),
            Err(e) => {
                warn!(
                    polygon = index,
                    resolution = u8::from(resolution),
                    error = %e,
                    "Skipping polygon that could not be tessellated"
                );
            }
        }
    }

    cells
}

/// Tessellate a single polygon (outer ring plus holes).
///
/// Rings with fewer than three distinct positions cover nothing and yield an
/// empty result rather than an error.
pub fn tessellate_polygon(
    polygon: &Polygon<f64>,
    resolution: Resolution,
) -> Result<Vec<CellIndex>, GeometryError> {
    if ring_is_degenerate(polygon.exterior()) {
        return Ok(Vec::new());
    }

    let interiors = polygon
        .interiors()
        .iter()
        .filter(|ring| !ring_is_degenerate(ring))
        .cloned()
        .collect();
    let polygon = Polygon::new(polygon.exterior().clone(), interiors);

    let mut tiler = TilerBuilder::new(resolution)
        .containment_mode(ContainmentMode::ContainsCentroid)
        .build();
    tiler.add(polygon).map_err(|e| GeometryError::InvalidRing {
        message: e.to_string(),
    })?;

    Ok(tiler.into_coverage().collect())
}

fn ring_is_degenerate(ring: &LineString<f64>) -> bool {
    let mut distinct: Vec<&Coord<f64>> = Vec::with_capacity(4);
    for coord in ring.coords() {
        if !distinct.contains(&coord) {
            distinct.push(coord);
            if distinct.len() >= 3 {
                return false;
            }
        }
    }
    true
}

/// Closed boundary polygon of a cell in GeoJSON order.
///
/// The grid library yields `(lat, lng)` vertices; they are flipped to
/// `(lng, lat)` and the ring is closed by repeating the first vertex.
pub fn cell_polygon(cell: CellIndex) -> Polygon<f64> {
    let boundary = cell.boundary();
    let mut coords: Vec<Coord<f64>> = boundary
        .iter()
        .map(|vertex| Coord {
            x: vertex.lng(),
            y: vertex.lat(),
        })
        .collect();

    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }

    Polygon::new(LineString::new(coords), Vec::new())
}

/// Parse a resolution number, rejecting values above 15.
pub fn resolution_from_u8(value: u8) -> Result<Resolution, GeometryError> {
    Resolution::try_from(value).map_err(|_| {
        GeometryError::InvalidCellIndex(format!("resolution {} is outside 0-15", value))
    })
}

/// Parse a hexagon index string.
pub fn parse_cell_index(text: &str) -> Result<CellIndex, GeometryError> {
    text.parse::<CellIndex>()
        .map_err(|_| GeometryError::InvalidCellIndex(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lng: f64, lat: f64, size_deg: f64) -> BoundaryGeometry {
        BoundaryGeometry::Polygon(Polygon::new(
            LineString::from(vec![
                (lng, lat),
                (lng + size_deg, lat),
                (lng + size_deg, lat + size_deg),
                (lng, lat + size_deg),
                (lng, lat),
            ]),
            Vec::new(),
        ))
    }

    #[test]
    fn test_square_is_covered() {
        let cells = tessellate(&square(29.0, 41.0, 0.1), Resolution::Eight);
        assert!(!cells.is_empty());
        assert!(cells.iter().all(|c| c.resolution() == Resolution::Eight));
    }

    #[test]
    fn test_finer_resolution_has_more_cells() {
        let area = square(29.0, 41.0, 0.1);
        let coarse = tessellate(&area, Resolution::Seven).len();
        let fine = tessellate(&area, Resolution::Nine).len();
        assert!(fine > coarse);
    }

    #[test]
    fn test_is_deterministic() {
        let area = square(-73.99, 40.70, 0.05);
        let first: Vec<String> = tessellate(&area, Resolution::Nine)
            .iter()
            .map(|c| c.to_string())
            .collect();
        let second: Vec<String> = tessellate(&area, Resolution::Nine)
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_ring_yields_no_cells() {
        let empty = BoundaryGeometry::Polygon(Polygon::new(LineString::new(Vec::new()), Vec::new()));
        assert!(tessellate(&empty, Resolution::Nine).is_empty());
    }

    #[test]
    fn test_collapsed_ring_yields_no_cells() {
        let line = BoundaryGeometry::Polygon(Polygon::new(
            LineString::from(vec![(10.0, 10.0), (10.5, 10.5), (10.0, 10.0)]),
            Vec::new(),
        ));
        assert!(tessellate(&line, Resolution::Nine).is_empty());
    }

    #[test]
    fn test_hole_removes_cells() {
        let outer = LineString::from(vec![
            (29.0, 41.0),
            (29.2, 41.0),
            (29.2, 41.2),
            (29.0, 41.2),
            (29.0, 41.0),
        ]);
        let hole = LineString::from(vec![
            (29.05, 41.05),
            (29.15, 41.05),
            (29.15, 41.15),
            (29.05, 41.15),
            (29.05, 41.05),
        ]);
        let solid = BoundaryGeometry::Polygon(Polygon::new(outer.clone(), Vec::new()));
        let holed = BoundaryGeometry::Polygon(Polygon::new(outer, vec![hole]));

        let solid_cells = tessellate(&solid, Resolution::Eight);
        let holed_cells = tessellate(&holed, Resolution::Eight);
        assert!(holed_cells.len() < solid_cells.len());
        assert!(holed_cells.is_subset(&solid_cells));
    }

    #[test]
    fn test_multipolygon_is_union_of_parts() {
        let a = square(29.0, 41.0, 0.05);
        let b = square(30.0, 41.0, 0.05);
        let (BoundaryGeometry::Polygon(pa), BoundaryGeometry::Polygon(pb)) = (&a, &b) else {
            unreachable!()
        };
        let multi = BoundaryGeometry::MultiPolygon(geo_types::MultiPolygon::new(vec![
            pa.clone(),
            pb.clone(),
        ]));

        let expected: BTreeSet<CellIndex> = tessellate(&a, Resolution::Nine)
            .union(&tessellate(&b, Resolution::Nine))
            .copied()
            .collect();
        assert_eq!(tessellate(&multi, Resolution::Nine), expected);
    }

    #[test]
    fn test_degenerate_part_does_not_sink_multipolygon() {
        let good = square(29.0, 41.0, 0.05);
        let BoundaryGeometry::Polygon(good_polygon) = &good else {
            unreachable!()
        };
        let multi = BoundaryGeometry::MultiPolygon(geo_types::MultiPolygon::new(vec![
            Polygon::new(LineString::new(Vec::new()), Vec::new()),
            good_polygon.clone(),
        ]));

        assert_eq!(
            tessellate(&multi, Resolution::Nine),
            tessellate(&good, Resolution::Nine)
        );
    }

    #[test]
    fn test_cell_polygon_is_closed_lng_lat() {
        let cells = tessellate(&square(29.0, 41.0, 0.05), Resolution::Nine);
        let cell = *cells.iter().next().unwrap();
        let polygon = cell_polygon(cell);
        let ring = &polygon.exterior().0;

        assert!(ring.len() >= 7);
        assert_eq!(ring.first(), ring.last());
        // Longitudes near 29, latitudes near 41
        assert!(ring.iter().all(|c| (c.x - 29.0).abs() < 0.2 && (c.y - 41.0).abs() < 0.2));
    }

    #[test]
    fn test_parse_helpers() {
        let cells = tessellate(&square(29.0, 41.0, 0.05), Resolution::Nine);
        let cell = *cells.iter().next().unwrap();
        assert_eq!(parse_cell_index(&cell.to_string()).unwrap(), cell);
        assert!(parse_cell_index("not-a-cell").is_err());
        assert_eq!(resolution_from_u8(9).unwrap(), Resolution::Nine);
        assert!(resolution_from_u8(16).is_err());
    }
}
