//! Batched generation pipeline.
//!
//! A run replaces every cell of its [`GridScope`]:
//!
//! ```text
//!  plan ─► lock scope ─► spawn ─┬─► 5%   plan event
//!                               ├─► 10%  delete scope cells (commit)
//!                               ├─► per resolution:
//!                               │     tessellate (blocking pool, heartbeats)
//!                               │     insert batches (commit each)
//!                               ├─► mark area generated (commit)
//!                               ├─► clear tile cache
//!                               └─► 100% success
//! ```
//!
//! Events travel through a bounded channel, so a slow consumer slows the
//! producer down. A dropped consumer stops the run at its next event; batches
//! already committed stay.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use h3o::CellIndex;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{GridError, StoreError};
use crate::geometry::BoundaryGeometry;
use crate::grid::{
    cell_polygon, format_area_km2, plan, resolution_area_km2, resolution_from_u8, tessellate,
};
use crate::store::{GridScope, GridStore, NewGridCell};
use crate::tile::TileCache;

use super::lock::{GenerationLocks, ScopeGuard};
use super::progress::{ProgressEvent, ProgressStream};

/// Default number of cells per committed batch.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Smallest accepted batch size.
pub const MIN_BATCH_SIZE: usize = 100;

/// Largest accepted batch size.
pub const MAX_BATCH_SIZE: usize = 5000;

/// Default quiet period before a heartbeat event.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(5);

/// Cell-area range and resolution count used when an area leaves them unset.
pub const DEFAULT_MIN_CELL_AREA_KM2: f64 = 0.0003;
pub const DEFAULT_MAX_CELL_AREA_KM2: f64 = 5.0;
pub const DEFAULT_NUM_RESOLUTIONS: i64 = 8;

const CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Configuration
// =============================================================================

/// Tuning for generation runs.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub batch_size: usize,
    pub heartbeat: Duration,
}

impl GeneratorConfig {
    /// Batch size is clamped to [`MIN_BATCH_SIZE`]..=[`MAX_BATCH_SIZE`].
    pub fn new(batch_size: usize, heartbeat: Duration) -> Self {
        Self {
            batch_size: batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE),
            heartbeat: heartbeat.max(Duration::from_millis(1)),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_HEARTBEAT)
    }
}

/// Everything a run needs once planning is done.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub scope: GridScope,
    pub boundary: Arc<BoundaryGeometry>,

    /// Ascending, non-empty
    pub resolutions: Vec<u8>,

    pub min_area_km2: f64,
    pub max_area_km2: f64,
}

// =============================================================================
// Grid Generator
// =============================================================================

/// Starts generation runs against a datastore.
pub struct GridGenerator<S: GridStore> {
    store: Arc<S>,
    config: GeneratorConfig,
    locks: GenerationLocks,

    /// Cleared when a run changes cells
    tile_cache: Option<Arc<TileCache>>,
}

impl<S: GridStore> Clone for GridGenerator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            locks: self.locks.clone(),
            tile_cache: self.tile_cache.clone(),
        }
    }
}

impl<S: GridStore> GridGenerator<S> {
    pub fn new(store: Arc<S>, config: GeneratorConfig) -> Self {
        Self {
            store,
            config,
            locks: GenerationLocks::new(),
            tile_cache: None,
        }
    }

    /// Invalidate `cache` whenever a run deletes or finishes writing cells.
    pub fn with_tile_cache(mut self, cache: Arc<TileCache>) -> Self {
        self.tile_cache = Some(cache);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Whether a run currently holds `scope`.
    pub fn is_running(&self, scope: &GridScope) -> bool {
        self.locks.is_held(scope)
    }

    /// Generate the grid of one area from its stored configuration.
    ///
    /// Unset (or zero) configuration values fall back to 0.0003 km², 5 km²
    /// and 8 resolutions.
    ///
    /// # Errors
    ///
    /// Returned before any persistence:
    /// - [`GridError::TargetNotFound`] for a missing area or boundary
    /// - [`GridError::InvalidConfiguration`] when planning rejects the range
    /// - [`GridError::GenerationInProgress`] when the area is being generated
    pub async fn generate_for_area(&self, area_id: Uuid) -> Result<ProgressStream, GridError> {
        let area = self
            .store
            .area(area_id)
            .await?
            .ok_or_else(|| GridError::TargetNotFound {
                target: format!("Area {}", area_id),
            })?;
        let boundary = area.boundary.ok_or_else(|| GridError::TargetNotFound {
            target: format!("Boundary of area {}", area_id),
        })?;

        let min_area_km2 = area
            .min_cell_area_km2
            .filter(|v| *v != 0.0)
            .unwrap_or(DEFAULT_MIN_CELL_AREA_KM2);
        let max_area_km2 = area
            .max_cell_area_km2
            .filter(|v| *v != 0.0)
            .unwrap_or(DEFAULT_MAX_CELL_AREA_KM2);
        let count = area
            .num_resolutions
            .filter(|n| *n != 0)
            .map(i64::from)
            .unwrap_or(DEFAULT_NUM_RESOLUTIONS);

        let resolutions = plan(min_area_km2, max_area_km2, count)?;

        self.start(GenerationJob {
            scope: GridScope::area(area.project_id, area.id),
            boundary: Arc::new(boundary),
            resolutions,
            min_area_km2,
            max_area_km2,
        })
    }

    /// Generate the legacy project-level grid over the project boundary.
    ///
    /// # Errors
    ///
    /// Same as [`GridGenerator::generate_for_area`].
    pub async fn generate_for_project(
        &self,
        project_id: Uuid,
        min_area_km2: f64,
        max_area_km2: f64,
        count: i64,
    ) -> Result<ProgressStream, GridError> {
        let project = self
            .store
            .project(project_id)
            .await?
            .ok_or_else(|| GridError::TargetNotFound {
                target: format!("Project {}", project_id),
            })?;
        let boundary = project.boundary.ok_or_else(|| GridError::TargetNotFound {
            target: format!("Boundary of project {}", project_id),
        })?;

        let resolutions = plan(min_area_km2, max_area_km2, count)?;

        self.start(GenerationJob {
            scope: GridScope::project(project_id),
            boundary: Arc::new(boundary),
            resolutions,
            min_area_km2,
            max_area_km2,
        })
    }

    /// Lock the job's scope and run it on a spawned task.
    ///
    /// # Errors
    ///
    /// [`GridError::GenerationInProgress`] if the scope is already held, and
    /// [`GridError::InvalidConfiguration`] for an empty resolution list.
    pub fn start(&self, job: GenerationJob) -> Result<ProgressStream, GridError> {
        if job.resolutions.is_empty() {
            return Err(GridError::invalid_config("no resolutions to generate"));
        }
        let guard = self.locks.try_acquire(job.scope)?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let run = Run {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            tile_cache: self.tile_cache.clone(),
            tx,
            last_event: Instant::now(),
            progress: 0,
        };
        tokio::spawn(run.run(job, guard));

        Ok(ProgressStream::new(rx))
    }
}

// =============================================================================
// Run
// =============================================================================

/// Why a run stopped early.
enum Halt {
    Disconnected,
    Store(StoreError),
}

impl From<StoreError> for Halt {
    fn from(e: StoreError) -> Self {
        Halt::Store(e)
    }
}

/// Progress reported once resolution `index` of `total` is reached.
fn resolution_progress(index: usize, total: usize) -> u8 {
    (10 + (index + 1) * 80 / total.max(1)) as u8
}

struct Run<S: GridStore> {
    store: Arc<S>,
    config: GeneratorConfig,
    tile_cache: Option<Arc<TileCache>>,
    tx: mpsc::Sender<ProgressEvent>,
    last_event: Instant,
    progress: u8,
}

impl<S: GridStore> Run<S> {
    async fn run(mut self, job: GenerationJob, guard: ScopeGuard) {
        let outcome = self.execute(&job).await;

        // Tiles rendered mid-run show a partial grid, whatever the outcome
        self.clear_tiles().await;

        match outcome {
            Ok((total, created)) => {
                info!(
                    scope = %job.scope,
                    cells = total,
                    resolutions = ?created,
                    "Grid generation finished"
                );
                let _ = self.tx.send(ProgressEvent::success(total, created)).await;
            }
            Err(Halt::Disconnected) => {
                info!(scope = %job.scope, "Progress consumer went away, stopping generation");
            }
            Err(Halt::Store(e)) => {
                error!(scope = %job.scope, error = %e, "Grid generation failed");
                let event = ProgressEvent::error(format!("Grid generation failed: {}", e), self.progress);
                let _ = self.tx.send(event).await;
            }
        }

        // Release the scope before the stream ends
        drop(guard);
    }

    /// Run every step up to the terminal event.
    ///
    /// Returns the number of cells saved and the resolutions that produced
    /// cells.
    async fn execute(&mut self, job: &GenerationJob) -> Result<(usize, Vec<u8>), Halt> {
        let scope = job.scope;
        info!(
            scope = %scope,
            resolutions = ?job.resolutions,
            "Starting grid generation"
        );

        self.emit(
            ProgressEvent::processing(format!("Processing geometry: {}", job.boundary.kind()), 5)
                .with_plan(job.resolutions.clone(), job.min_area_km2, job.max_area_km2),
        )
        .await?;

        let removed = self.store.delete_cells(&scope).await?;
        self.clear_tiles().await;
        debug!(scope = %scope, removed, "Deleted previous cells");
        self.emit(ProgressEvent::processing(
            format!("Cleared existing cells for {}", scope),
            10,
        ))
        .await?;

        let mut total = 0usize;
        let mut created = Vec::with_capacity(job.resolutions.len());

        for (index, &resolution) in job.resolutions.iter().enumerate() {
            let cells = self
                .tessellate(Arc::clone(&job.boundary), resolution)
                .await?;
            if cells.is_empty() {
                debug!(resolution, "No cells at resolution, skipping");
                continue;
            }

            let progress = resolution_progress(index, job.resolutions.len());
            let area = resolution_area_km2(resolution).unwrap_or(0.0);
            self.emit(
                ProgressEvent::processing(
                    format!(
                        "Resolution {} ({}): {} cells",
                        resolution,
                        format_area_km2(area),
                        cells.len()
                    ),
                    progress,
                )
                .with_resolution(resolution)
                .with_cells(cells.len()),
            )
            .await?;

            for chunk in cells.chunks(self.config.batch_size) {
                let batch: Vec<NewGridCell> = chunk
                    .iter()
                    .map(|&cell| NewGridCell {
                        h3_index: cell.to_string(),
                        resolution,
                        boundary: cell_polygon(cell),
                    })
                    .collect();

                let store = Arc::clone(&self.store);
                self.with_heartbeats(store.insert_cells(&scope, &batch), resolution, "saving cells")
                    .await??;
                total += batch.len();
                debug!(resolution, batch = batch.len(), total, "Saved cell batch");

                self.emit(
                    ProgressEvent::processing(
                        format!("Resolution {}: {} cells saved", resolution, total),
                        progress,
                    )
                    .with_resolution(resolution)
                    .with_count(total),
                )
                .await?;
            }

            created.push(resolution);
        }

        if let Some(area_id) = scope.area_id {
            self.store.mark_grids_generated(area_id).await?;
        }

        Ok((total, created))
    }

    /// Tessellate on the blocking pool, sending heartbeats while it runs.
    ///
    /// A failed tessellation task is logged and yields no cells.
    async fn tessellate(
        &mut self,
        boundary: Arc<BoundaryGeometry>,
        resolution: u8,
    ) -> Result<Vec<CellIndex>, Halt> {
        let grid_resolution = match resolution_from_u8(resolution) {
            Ok(r) => r,
            Err(e) => {
                warn!(resolution, error = %e, "Skipping unusable resolution");
                return Ok(Vec::new());
            }
        };

        let task = tokio::task::spawn_blocking(move || {
            tessellate(&boundary, grid_resolution)
                .into_iter()
                .collect::<Vec<_>>()
        });

        let joined = self.with_heartbeats(task, resolution, "tessellating").await?;
        Ok(joined.unwrap_or_else(|e| {
            warn!(resolution, error = %e, "Tessellation task failed, skipping resolution");
            Vec::new()
        }))
    }

    /// Drive `work` to completion, emitting a heartbeat whenever the stream
    /// has been quiet for the configured interval.
    async fn with_heartbeats<F: Future>(
        &mut self,
        work: F,
        resolution: u8,
        activity: &str,
    ) -> Result<F::Output, Halt> {
        tokio::pin!(work);

        let mut ticker = interval(self.config.heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                output = &mut work => return Ok(output),
                _ = ticker.tick() => {
                    if self.last_event.elapsed() >= self.config.heartbeat {
                        let heartbeat = ProgressEvent::processing(
                            format!("Resolution {}: {}...", resolution, activity),
                            self.progress,
                        )
                        .with_resolution(resolution);
                        self.emit(heartbeat).await?;
                    }
                }
            }
        }
    }

    async fn emit(&mut self, event: ProgressEvent) -> Result<(), Halt> {
        self.progress = event.progress;
        self.tx.send(event).await.map_err(|_| Halt::Disconnected)?;
        self.last_event = Instant::now();
        Ok(())
    }

    async fn clear_tiles(&self) {
        if let Some(cache) = &self.tile_cache {
            cache.clear().await;
        }
    }
}
