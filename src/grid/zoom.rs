//! Zoom-adaptive resolution selection.

use serde::Serialize;

use crate::error::GridError;

use super::resolution::zoom_table_resolution;

/// Zoom at or below which the coarsest served resolution applies.
const LOW_ZOOM: u8 = 5;

/// Resolution served at low zooms.
const LOW_ZOOM_RESOLUTION: u8 = 3;

/// Which client is being served. GeoJSON responses carry full geometries so
/// they stop refining earlier than vector tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingProfile {
    GeoJson,
    VectorTile,
}

impl ServingProfile {
    /// Zoom at which the profile's cap is reached.
    pub fn upper_zoom(self) -> u8 {
        match self {
            ServingProfile::GeoJson => 14,
            ServingProfile::VectorTile => 20,
        }
    }

    /// Finest resolution the profile ever targets.
    pub fn max_resolution(self) -> u8 {
        match self {
            ServingProfile::GeoJson => 11,
            ServingProfile::VectorTile => 15,
        }
    }
}

/// Preferred resolution for a map zoom under `profile`.
pub fn target_resolution(zoom: u8, profile: ServingProfile) -> u8 {
    if zoom <= LOW_ZOOM {
        return LOW_ZOOM_RESOLUTION;
    }
    if zoom >= profile.upper_zoom() {
        return profile.max_resolution();
    }
    zoom_table_resolution(zoom)
        .unwrap_or(profile.max_resolution())
        .min(profile.max_resolution())
}

/// Pick the resolution in `available` closest to the zoom's target.
///
/// On a tie the first candidate in `available` wins, so callers pass the
/// list sorted ascending to prefer the coarser grid.
pub fn select(available: &[u8], zoom: u8, profile: ServingProfile) -> Result<u8, GridError> {
    let target = target_resolution(zoom, profile) as i16;

    let mut best: Option<(u8, i16)> = None;
    for &res in available {
        let diff = (res as i16 - target).abs();
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((res, diff)),
        }
    }

    best.map(|(res, _)| res).ok_or(GridError::NoDataAvailable)
}
