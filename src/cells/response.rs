//! Serialized shapes of the cell query endpoints.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::geometry::polygon_to_geojson;
use crate::store::CellRecord;

const FEATURE: &str = "Feature";
const FEATURE_COLLECTION: &str = "FeatureCollection";

/// Properties attached to every served cell.
#[derive(Debug, Clone, Serialize)]
pub struct CellProperties {
    pub h3_index: String,
    pub resolution: u8,
    pub area_id: Option<Uuid>,
}

/// GeoJSON Feature for one cell.
#[derive(Debug, Clone, Serialize)]
pub struct CellFeature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: CellProperties,
    pub geometry: Value,
}

impl From<&CellRecord> for CellFeature {
    fn from(cell: &CellRecord) -> Self {
        Self {
            kind: FEATURE,
            properties: CellProperties {
                h3_index: cell.h3_index.clone(),
                resolution: cell.resolution,
                area_id: cell.area_id,
            },
            geometry: polygon_to_geojson(&cell.boundary),
        }
    }
}

fn features(cells: &[CellRecord]) -> Vec<CellFeature> {
    cells.iter().map(CellFeature::from).collect()
}

/// FeatureCollection of stored cells.
#[derive(Debug, Clone, Serialize)]
pub struct CellCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,

    /// Set on area routes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<Uuid>,

    pub features: Vec<CellFeature>,
}

impl CellCollection {
    pub fn new(cells: &[CellRecord]) -> Self {
        Self {
            kind: FEATURE_COLLECTION,
            area_id: None,
            features: features(cells),
        }
    }

    pub fn with_area(mut self, area_id: Uuid) -> Self {
        self.area_id = Some(area_id);
        self
    }
}

/// Zoom-adaptive FeatureCollection.
///
/// `resolution` is `null` and `available_resolutions` empty when no cells
/// exist under the filter.
#[derive(Debug, Clone, Serialize)]
pub struct ZoomCollection {
    pub resolution: Option<u8>,
    pub zoom: u8,
    pub available_resolutions: Vec<u8>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<CellFeature>,
}

impl ZoomCollection {
    pub fn empty(zoom: u8) -> Self {
        Self {
            resolution: None,
            zoom,
            available_resolutions: Vec::new(),
            kind: FEATURE_COLLECTION,
            features: Vec::new(),
        }
    }

    pub fn new(resolution: u8, zoom: u8, available: Vec<u8>, cells: &[CellRecord]) -> Self {
        Self {
            resolution: Some(resolution),
            zoom,
            available_resolutions: available,
            kind: FEATURE_COLLECTION,
            features: features(cells),
        }
    }
}

/// Cell count of one stored resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionSummary {
    pub resolution: u8,
    pub count: u64,
    pub approx_area_km2: f64,
}

/// Feature of an intersecting cell, carrying only its index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexFeature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: IndexProperties,
    pub geometry: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexProperties {
    pub h3_index: String,
}

/// Finest-resolution cells intersecting a selection.
///
/// `count` and `geometries` are present only when the selection matched
/// stored cells.
#[derive(Debug, Clone, Serialize)]
pub struct IntersectingCells {
    pub cells: Vec<String>,
    pub resolution: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometries: Option<Vec<IndexFeature>>,
}

impl IntersectingCells {
    pub fn empty(resolution: Option<u8>) -> Self {
        Self {
            cells: Vec::new(),
            resolution,
            count: None,
            geometries: None,
        }
    }

    pub fn new(resolution: u8, cells: &[CellRecord]) -> Self {
        let geometries = cells
            .iter()
            .map(|cell| IndexFeature {
                kind: FEATURE,
                properties: IndexProperties {
                    h3_index: cell.h3_index.clone(),
                },
                geometry: polygon_to_geojson(&cell.boundary),
            })
            .collect();

        Self {
            cells: cells.iter().map(|c| c.h3_index.clone()).collect(),
            resolution: Some(resolution),
            count: Some(cells.len()),
            geometries: Some(geometries),
        }
    }
}
