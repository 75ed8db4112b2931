//! In-process grid store.
//!
//! Keeps areas, projects and cells in memory behind an async `RwLock`. Spatial
//! predicates run on `geo` and tiles are encoded with [`MvtTileEncoder`].
//! Used when the server runs without a database and as the datastore of the
//! test suite.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use geo::{BooleanOps, BoundingRect, Intersects};
use geo_types::MultiPolygon;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::geometry::BoundaryGeometry;
use crate::tile::{MvtTileEncoder, TileBounds};

use super::{
    AreaRecord, CellFilter, CellRecord, GridScope, GridStore, NewGridCell, ProjectRecord,
    ResolutionCount,
};

#[derive(Debug, Clone)]
struct StoredCell {
    project_id: Uuid,
    record: CellRecord,
}

#[derive(Default)]
struct Tables {
    areas: HashMap<Uuid, AreaRecord>,
    projects: HashMap<Uuid, ProjectRecord>,
    cells: Vec<StoredCell>,
}

impl Tables {
    fn filtered<'a>(&'a self, filter: &'a CellFilter) -> impl Iterator<Item = &'a CellRecord> + 'a {
        self.cells
            .iter()
            .filter(move |c| filter.matches(c.project_id, c.record.area_id))
            .map(|c| &c.record)
    }
}

/// Grid store held entirely in memory.
#[derive(Default)]
pub struct InMemoryGridStore {
    tables: RwLock<Tables>,
    encoder: MvtTileEncoder,

    /// Successful inserts before every further insert fails
    fail_inserts_after: Option<usize>,
    inserts: AtomicUsize,

    /// Latency added to every insert
    insert_delay: Option<Duration>,
}

impl InMemoryGridStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an area, creating its project if needed.
    pub fn with_area(mut self, area: AreaRecord) -> Self {
        let tables = self.tables.get_mut();
        tables.projects.entry(area.project_id).or_insert(ProjectRecord {
            id: area.project_id,
            boundary: None,
        });
        tables.areas.insert(area.id, area);
        self
    }

    /// Add (or replace) a project.
    pub fn with_project(mut self, project_id: Uuid, boundary: Option<BoundaryGeometry>) -> Self {
        self.tables.get_mut().projects.insert(
            project_id,
            ProjectRecord {
                id: project_id,
                boundary,
            },
        );
        self
    }

    /// Make every insert after the first `batches` fail with a query error.
    pub fn failing_inserts_after(mut self, batches: usize) -> Self {
        self.fail_inserts_after = Some(batches);
        self
    }

    /// Make every insert take at least `delay`.
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    /// Number of successful batch inserts so far.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Snapshot of an area record.
    pub async fn area_snapshot(&self, area_id: Uuid) -> Option<AreaRecord> {
        self.tables.read().await.areas.get(&area_id).cloned()
    }

    /// Number of cells owned by `scope`.
    pub async fn scope_cell_count(&self, scope: &GridScope) -> usize {
        self.tables
            .read()
            .await
            .cells
            .iter()
            .filter(|c| scope.owns(c.project_id, c.record.area_id))
            .count()
    }
}

#[async_trait]
impl GridStore for InMemoryGridStore {
    async fn area(&self, area_id: Uuid) -> Result<Option<AreaRecord>, StoreError> {
        Ok(self.tables.read().await.areas.get(&area_id).cloned())
    }

    async fn project(&self, project_id: Uuid) -> Result<Option<ProjectRecord>, StoreError> {
        Ok(self.tables.read().await.projects.get(&project_id).cloned())
    }

    async fn delete_cells(&self, scope: &GridScope) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.cells.len();
        tables
            .cells
            .retain(|c| !scope.owns(c.project_id, c.record.area_id));
        Ok((before - tables.cells.len()) as u64)
    }

    async fn insert_cells(&self, scope: &GridScope, cells: &[NewGridCell]) -> Result<(), StoreError> {
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(limit) = self.fail_inserts_after {
            if self.inserts.load(Ordering::SeqCst) >= limit {
                return Err(StoreError::Query("insert rejected".to_string()));
            }
        }

        let mut tables = self.tables.write().await;
        tables.cells.extend(cells.iter().map(|cell| StoredCell {
            project_id: scope.project_id,
            record: CellRecord {
                h3_index: cell.h3_index.clone(),
                resolution: cell.resolution,
                area_id: scope.area_id,
                boundary: cell.boundary.clone(),
            },
        }));
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mark_grids_generated(&self, area_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.areas.get_mut(&area_id) {
            Some(area) => {
                area.grids_generated = true;
                Ok(())
            }
            None => Err(StoreError::Query(format!("area {} does not exist", area_id))),
        }
    }

    async fn resolutions(&self, filter: &CellFilter) -> Result<Vec<ResolutionCount>, StoreError> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<u8, u64> = BTreeMap::new();
        for cell in tables.filtered(filter) {
            *counts.entry(cell.resolution).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(resolution, count)| ResolutionCount { resolution, count })
            .collect())
    }

    async fn cells(
        &self,
        filter: &CellFilter,
        resolution: Option<u8>,
    ) -> Result<Vec<CellRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut cells: Vec<CellRecord> = tables
            .filtered(filter)
            .filter(|c| resolution.map_or(true, |r| c.resolution == r))
            .cloned()
            .collect();
        cells.sort_by(|a, b| (a.resolution, &a.h3_index).cmp(&(b.resolution, &b.h3_index)));
        Ok(cells)
    }

    async fn union_of_cells(
        &self,
        filter: &CellFilter,
        h3_indices: &[String],
    ) -> Result<Option<MultiPolygon<f64>>, StoreError> {
        let wanted: HashSet<&str> = h3_indices.iter().map(String::as_str).collect();
        let tables = self.tables.read().await;

        let mut union: Option<MultiPolygon<f64>> = None;
        for cell in tables
            .filtered(filter)
            .filter(|c| wanted.contains(c.h3_index.as_str()))
        {
            let part = MultiPolygon::new(vec![cell.boundary.clone()]);
            union = Some(match union {
                Some(acc) => acc.union(&part),
                None => part,
            });
        }
        Ok(union)
    }

    async fn cells_intersecting(
        &self,
        filter: &CellFilter,
        resolution: u8,
        geometry: &MultiPolygon<f64>,
    ) -> Result<Vec<CellRecord>, StoreError> {
        let cells = self.cells(filter, Some(resolution)).await?;
        Ok(cells
            .into_iter()
            .filter(|c| c.boundary.intersects(geometry))
            .collect())
    }

    async fn render_tile(
        &self,
        filter: &CellFilter,
        resolution: u8,
        bounds: &TileBounds,
    ) -> Result<Option<Bytes>, StoreError> {
        let bbox = bounds.to_lnglat();
        let cells: Vec<CellRecord> = self
            .cells(filter, Some(resolution))
            .await?
            .into_iter()
            .filter(|c| {
                c.boundary
                    .bounding_rect()
                    .map_or(false, |rect| rect.intersects(&bbox))
            })
            .collect();

        self.encoder.encode(&cells, bounds)
    }
}
