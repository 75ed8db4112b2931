//! Spatial datastore abstraction.
//!
//! Grid cells live in a spatial database. Everything above this module talks
//! to it through the [`GridStore`] trait so the generation pipeline and the
//! serving layer stay independent of the engine:
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │  GridGenerator   │   │   CellService    │   │   TileService    │
//! └────────┬─────────┘   └────────┬─────────┘   └────────┬─────────┘
//!          └──────────────────────┼──────────────────────┘
//!                                 ▼
//!                     ┌───────────────────────┐
//!                     │    GridStore trait    │
//!                     └───────────┬───────────┘
//!                     ┌───────────┴───────────┐
//!                     ▼                       ▼
//!          ┌────────────────────┐  ┌────────────────────┐
//!          │ PostgisGridStore   │  │ InMemoryGridStore  │
//!          │ (sqlx, ST_AsMVT)   │  │ (geo, mvt)         │
//!          └────────────────────┘  └────────────────────┘
//! ```

mod memory;
mod postgis;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use geo_types::{MultiPolygon, Polygon};
use uuid::Uuid;

use crate::error::StoreError;
use crate::geometry::BoundaryGeometry;
use crate::tile::TileBounds;

pub use memory::InMemoryGridStore;
pub use postgis::{PostgisGridStore, PostgisOptions};

// =============================================================================
// Records
// =============================================================================

/// A user-defined region with its own grid configuration.
///
/// The cell-area range and resolution count are optional in storage; the
/// generation front door applies defaults when they are unset.
#[derive(Debug, Clone)]
pub struct AreaRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub boundary: Option<BoundaryGeometry>,
    pub min_cell_area_km2: Option<f64>,
    pub max_cell_area_km2: Option<f64>,
    pub num_resolutions: Option<i32>,
    pub grids_generated: bool,
}

impl AreaRecord {
    /// Area with a boundary and no explicit grid configuration.
    pub fn new(id: Uuid, project_id: Uuid, boundary: BoundaryGeometry) -> Self {
        Self {
            id,
            project_id,
            boundary: Some(boundary),
            min_cell_area_km2: None,
            max_cell_area_km2: None,
            num_resolutions: None,
            grids_generated: false,
        }
    }

    /// Set the cell-area range and resolution count.
    pub fn with_grid_config(mut self, min_km2: f64, max_km2: f64, count: i32) -> Self {
        self.min_cell_area_km2 = Some(min_km2);
        self.max_cell_area_km2 = Some(max_km2);
        self.num_resolutions = Some(count);
        self
    }
}

/// A project and its (optional) boundary.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub boundary: Option<BoundaryGeometry>,
}

/// A cell ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewGridCell {
    pub h3_index: String,
    pub resolution: u8,
    pub boundary: Polygon<f64>,
}

/// A persisted cell as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    pub h3_index: String,
    pub resolution: u8,
    pub area_id: Option<Uuid>,
    pub boundary: Polygon<f64>,
}

/// Number of persisted cells at one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionCount {
    pub resolution: u8,
    pub count: u64,
}

// =============================================================================
// Scopes and Filters
// =============================================================================

/// Ownership key of a generation run.
///
/// With an area the run owns that area's cells. Without one it owns the
/// project's legacy cells, the ones not attached to any area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridScope {
    pub project_id: Uuid,
    pub area_id: Option<Uuid>,
}

impl GridScope {
    pub fn area(project_id: Uuid, area_id: Uuid) -> Self {
        Self {
            project_id,
            area_id: Some(area_id),
        }
    }

    pub fn project(project_id: Uuid) -> Self {
        Self {
            project_id,
            area_id: None,
        }
    }

    /// Whether a cell with this ownership belongs to the scope.
    pub fn owns(&self, project_id: Uuid, area_id: Option<Uuid>) -> bool {
        self.project_id == project_id && self.area_id == area_id
    }
}

impl fmt::Display for GridScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.area_id {
            Some(area_id) => write!(f, "area {}", area_id),
            None => write!(f, "project {}", self.project_id),
        }
    }
}

/// Read-side cell selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellFilter {
    /// Every cell of one area
    Area(Uuid),

    /// Every cell of a project, optionally narrowed to one area
    Project {
        project_id: Uuid,
        area_id: Option<Uuid>,
    },
}

impl CellFilter {
    pub fn project(project_id: Uuid, area_id: Option<Uuid>) -> Self {
        CellFilter::Project {
            project_id,
            area_id,
        }
    }

    /// Whether a cell with this ownership passes the filter.
    pub fn matches(&self, project_id: Uuid, area_id: Option<Uuid>) -> bool {
        match *self {
            CellFilter::Area(wanted) => area_id == Some(wanted),
            CellFilter::Project {
                project_id: wanted_project,
                area_id: wanted_area,
            } => {
                project_id == wanted_project
                    && wanted_area.map_or(true, |wanted| area_id == Some(wanted))
            }
        }
    }
}

// =============================================================================
// GridStore Trait
// =============================================================================

/// The datastore collaborator.
///
/// Each write method is its own commit: a failure leaves earlier commits in
/// place and nothing partial from the failing call.
#[async_trait]
pub trait GridStore: Send + Sync + 'static {
    /// Load an area, `None` when it does not exist.
    async fn area(&self, area_id: Uuid) -> Result<Option<AreaRecord>, StoreError>;

    /// Load a project, `None` when it does not exist.
    async fn project(&self, project_id: Uuid) -> Result<Option<ProjectRecord>, StoreError>;

    /// Delete every cell owned by `scope`, returning how many were removed.
    async fn delete_cells(&self, scope: &GridScope) -> Result<u64, StoreError>;

    /// Persist one batch of cells under `scope` in a single commit.
    async fn insert_cells(&self, scope: &GridScope, cells: &[NewGridCell]) -> Result<(), StoreError>;

    /// Flag an area as having generated grids.
    async fn mark_grids_generated(&self, area_id: Uuid) -> Result<(), StoreError>;

    /// Resolutions present under `filter` with their cell counts, ascending.
    async fn resolutions(&self, filter: &CellFilter) -> Result<Vec<ResolutionCount>, StoreError>;

    /// Cells under `filter`, optionally restricted to one resolution.
    async fn cells(
        &self,
        filter: &CellFilter,
        resolution: Option<u8>,
    ) -> Result<Vec<CellRecord>, StoreError>;

    /// Union of the boundaries of the listed cells under `filter`.
    ///
    /// `None` when none of the indices match a stored cell.
    async fn union_of_cells(
        &self,
        filter: &CellFilter,
        h3_indices: &[String],
    ) -> Result<Option<MultiPolygon<f64>>, StoreError>;

    /// Cells at `resolution` under `filter` whose boundary intersects `geometry`.
    async fn cells_intersecting(
        &self,
        filter: &CellFilter,
        resolution: u8,
        geometry: &MultiPolygon<f64>,
    ) -> Result<Vec<CellRecord>, StoreError>;

    /// Encode the cells at `resolution` overlapping `bounds` as a vector tile.
    ///
    /// `None` when the tile would hold no features.
    async fn render_tile(
        &self,
        filter: &CellFilter,
        resolution: u8,
        bounds: &TileBounds,
    ) -> Result<Option<Bytes>, StoreError>;
}
