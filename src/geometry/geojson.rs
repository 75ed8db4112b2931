//! GeoJSON reading and writing for area boundaries and cell polygons.
//!
//! Boundaries arrive as GeoJSON (`[lng, lat]` positions) either from the
//! datastore (`ST_AsGeoJSON`) or from a caller. Only `Polygon` and
//! `MultiPolygon` can be tessellated; a `Feature` wrapper is unwrapped.
//!
//! All geometries are held as `geo_types` values with `x = longitude` and
//! `y = latitude`.

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};

use crate::error::GeometryError;

// =============================================================================
// Boundary Geometry
// =============================================================================

/// A tessellatable area boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryGeometry {
    /// One outer ring with zero or more holes
    Polygon(Polygon<f64>),

    /// Independent polygons, each with its own holes
    MultiPolygon(MultiPolygon<f64>),
}

impl BoundaryGeometry {
    /// Parse a GeoJSON geometry (or Feature) from its textual form.
    pub fn from_geojson_str(text: &str) -> Result<Self, GeometryError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| GeometryError::InvalidGeoJson(e.to_string()))?;
        Self::from_geojson(&value)
    }

    /// Parse a GeoJSON geometry (or Feature) value.
    pub fn from_geojson(value: &Value) -> Result<Self, GeometryError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| GeometryError::InvalidGeoJson("missing \"type\" member".to_string()))?;

        match kind {
            "Feature" => {
                let geometry = value.get("geometry").filter(|g| !g.is_null()).ok_or_else(|| {
                    GeometryError::InvalidGeoJson("feature has no geometry".to_string())
                })?;
                Self::from_geojson(geometry)
            }
            "Polygon" => {
                let rings = coordinates(value)?;
                Ok(BoundaryGeometry::Polygon(parse_polygon(rings)?))
            }
            "MultiPolygon" => {
                let polygons = coordinates(value)?
                    .as_array()
                    .ok_or_else(|| not_an_array("MultiPolygon coordinates"))?
                    .iter()
                    .map(parse_polygon)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(BoundaryGeometry::MultiPolygon(MultiPolygon::new(polygons)))
            }
            other => Err(GeometryError::UnsupportedType(other.to_string())),
        }
    }

    /// GeoJSON type name of this boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            BoundaryGeometry::Polygon(_) => "Polygon",
            BoundaryGeometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// The polygons making up this boundary, in input order.
    pub fn polygons(&self) -> &[Polygon<f64>] {
        match self {
            BoundaryGeometry::Polygon(polygon) => std::slice::from_ref(polygon),
            BoundaryGeometry::MultiPolygon(multi) => &multi.0,
        }
    }

    /// Flatten into a multi-polygon.
    pub fn into_multi_polygon(self) -> MultiPolygon<f64> {
        match self {
            BoundaryGeometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
            BoundaryGeometry::MultiPolygon(multi) => multi,
        }
    }

    /// Render back to a GeoJSON geometry value.
    pub fn to_geojson(&self) -> Value {
        match self {
            BoundaryGeometry::Polygon(polygon) => polygon_to_geojson(polygon),
            BoundaryGeometry::MultiPolygon(multi) => multi_polygon_to_geojson(multi),
        }
    }
}

fn coordinates(value: &Value) -> Result<&Value, GeometryError> {
    value
        .get("coordinates")
        .ok_or_else(|| GeometryError::InvalidGeoJson("missing \"coordinates\" member".to_string()))
}

fn not_an_array(what: &str) -> GeometryError {
    GeometryError::InvalidGeoJson(format!("{} must be an array", what))
}

fn parse_polygon(rings: &Value) -> Result<Polygon<f64>, GeometryError> {
    let rings = rings
        .as_array()
        .ok_or_else(|| not_an_array("polygon rings"))?;

    let mut parsed = rings.iter().map(parse_ring);
    let exterior = match parsed.next() {
        Some(ring) => ring?,
        None => LineString::new(Vec::new()),
    };
    let interiors = parsed.collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(ring: &Value) -> Result<LineString<f64>, GeometryError> {
    let positions = ring.as_array().ok_or_else(|| not_an_array("ring"))?;

    let coords = positions
        .iter()
        .map(|position| {
            let pair = position
                .as_array()
                .filter(|p| p.len() >= 2)
                .ok_or_else(|| GeometryError::InvalidRing {
                    message: format!("position {} needs at least two numbers", position),
                })?;

            let lng = pair[0].as_f64();
            let lat = pair[1].as_f64();
            match (lng, lat) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
                _ => Err(GeometryError::InvalidRing {
                    message: format!("position {} is not numeric", position),
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LineString::new(coords))
}

// =============================================================================
// Writers
// =============================================================================

fn ring_positions(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_positions)
        .collect()
}

/// Render a polygon as a GeoJSON geometry value.
pub fn polygon_to_geojson(polygon: &Polygon<f64>) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": polygon_rings(polygon),
    })
}

/// Render a multi-polygon as a GeoJSON geometry value.
pub fn multi_polygon_to_geojson(multi: &MultiPolygon<f64>) -> Value {
    let polygons: Vec<_> = multi.iter().map(polygon_rings).collect();
    json!({
        "type": "MultiPolygon",
        "coordinates": polygons,
    })
}

/// Render a polygon as WKT, e.g. `POLYGON((lng lat,lng lat,...))`.
pub fn polygon_to_wkt(polygon: &Polygon<f64>) -> String {
    let rings: Vec<String> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| {
            let points: Vec<String> = ring.coords().map(|c| format!("{} {}", c.x, c.y)).collect();
            format!("({})", points.join(","))
        })
        .collect();
    format!("POLYGON({})", rings.join(","))
}
