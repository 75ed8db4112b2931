//! GeoJSON cell queries.
//!
//! - [`CellService`] - collections, zoom-adaptive collections, resolution
//!   counts and intersecting-cell lookups over a [`GridStore`](crate::store::GridStore)
//! - [`response`] - the serialized response shapes

pub mod response;
mod service;

pub use response::{
    CellCollection, CellFeature, CellProperties, IntersectingCells, ResolutionSummary,
    ZoomCollection,
};
pub use service::{CellService, FALLBACK_INTERSECT_RESOLUTION};
