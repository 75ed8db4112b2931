//! Hexagonal grid core.
//!
//! - [`resolution`]: static area and zoom tables
//! - [`planner`]: cell-area range to resolution set
//! - [`tessellate`]: boundary to cell set
//! - [`zoom`]: zoom-adaptive resolution choice

pub mod planner;
pub mod resolution;
pub mod tessellate;
pub mod zoom;

pub use planner::{plan, MAX_PLANNED_RESOLUTION};
pub use resolution::{
    format_area_km2, nearest_resolution_for_area, resolution_area_km2, RESOLUTION_AREAS_KM2,
    ZOOM_RESOLUTIONS,
};
pub use tessellate::{cell_polygon, parse_cell_index, resolution_from_u8, tessellate};
pub use zoom::{select, target_resolution, ServingProfile};
