//! Cell queries behind the GeoJSON endpoints.

use std::sync::Arc;

use tracing::debug;

use crate::error::GridError;
use crate::grid::{parse_cell_index, resolution_area_km2, select, ServingProfile};
use crate::store::{CellFilter, GridStore};

use super::response::{
    CellCollection, IntersectingCells, ResolutionSummary, ZoomCollection,
};

/// Resolution searched when no cells exist under the filter.
pub const FALLBACK_INTERSECT_RESOLUTION: u8 = 8;

/// Read-only queries over stored cells.
pub struct CellService<S: GridStore> {
    store: Arc<S>,
}

impl<S: GridStore> CellService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Every cell under `filter`, optionally limited to one resolution.
    pub async fn collection(
        &self,
        filter: &CellFilter,
        resolution: Option<u8>,
    ) -> Result<CellCollection, GridError> {
        let cells = self.store.cells(filter, resolution).await?;
        Ok(CellCollection::new(&cells))
    }

    /// Stored resolutions under `filter`, ascending.
    pub async fn available_resolutions(&self, filter: &CellFilter) -> Result<Vec<u8>, GridError> {
        Ok(self
            .store
            .resolutions(filter)
            .await?
            .into_iter()
            .map(|r| r.resolution)
            .collect())
    }

    /// Cells at the stored resolution nearest to what `zoom` calls for.
    pub async fn by_zoom(&self, filter: &CellFilter, zoom: u8) -> Result<ZoomCollection, GridError> {
        let available = self.available_resolutions(filter).await?;
        let resolution = match select(&available, zoom, ServingProfile::GeoJson) {
            Ok(resolution) => resolution,
            Err(GridError::NoDataAvailable) => return Ok(ZoomCollection::empty(zoom)),
            Err(e) => return Err(e),
        };

        debug!(zoom, resolution, "Serving cells by zoom");
        let cells = self.store.cells(filter, Some(resolution)).await?;
        Ok(ZoomCollection::new(resolution, zoom, available, &cells))
    }

    /// Cell counts per stored resolution with the nominal cell area.
    pub async fn resolution_summaries(
        &self,
        filter: &CellFilter,
    ) -> Result<Vec<ResolutionSummary>, GridError> {
        Ok(self
            .store
            .resolutions(filter)
            .await?
            .into_iter()
            .map(|r| ResolutionSummary {
                resolution: r.resolution,
                count: r.count,
                approx_area_km2: resolution_area_km2(r.resolution).unwrap_or(0.0),
            })
            .collect())
    }

    /// Finest stored cells intersecting the union of `selected` cells.
    ///
    /// # Errors
    ///
    /// [`GridError::Geometry`] when a selected index is not a valid cell.
    pub async fn intersecting(
        &self,
        filter: &CellFilter,
        selected: &[String],
    ) -> Result<IntersectingCells, GridError> {
        if selected.is_empty() {
            return Ok(IntersectingCells::empty(None));
        }
        for index in selected {
            parse_cell_index(index)?;
        }

        let finest = self
            .available_resolutions(filter)
            .await?
            .last()
            .copied()
            .unwrap_or(FALLBACK_INTERSECT_RESOLUTION);

        let Some(union) = self.store.union_of_cells(filter, selected).await? else {
            return Ok(IntersectingCells::empty(Some(finest)));
        };

        let cells = self.store.cells_intersecting(filter, finest, &union).await?;
        debug!(
            selected = selected.len(),
            resolution = finest,
            matched = cells.len(),
            "Resolved intersecting cells"
        );
        Ok(IntersectingCells::new(finest, &cells))
    }
}
