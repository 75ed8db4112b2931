//! Grid generation.
//!
//! A run tessellates a boundary at each planned resolution and replaces the
//! cells of its scope in the datastore, reporting progress as an ordered
//! stream of [`ProgressEvent`]s that ends with exactly one terminal event.
//!
//! - [`GridGenerator`] - front doors for area and legacy project runs
//! - [`ProgressEvent`] / [`ProgressStream`] - the progress protocol
//! - [`GenerationLocks`] - one run per scope at a time

mod lock;
mod pipeline;
mod progress;

pub use lock::{GenerationLocks, ScopeGuard};
pub use pipeline::{
    GenerationJob, GeneratorConfig, GridGenerator, DEFAULT_BATCH_SIZE, DEFAULT_HEARTBEAT,
    DEFAULT_MAX_CELL_AREA_KM2, DEFAULT_MIN_CELL_AREA_KM2, DEFAULT_NUM_RESOLUTIONS,
    MAX_BATCH_SIZE, MIN_BATCH_SIZE,
};
pub use progress::{EventStatus, ProgressEvent, ProgressStream};
