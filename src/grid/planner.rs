//! Resolution planning.
//!
//! Turns a cell-area range chosen by a user into the set of H3 resolutions
//! that a generation run materializes.

use crate::error::GridError;

use super::resolution::{nearest_resolution_for_area, MIN_RESOLUTION};

/// Finest resolution a plan may include. Bounds the total cell count for
/// small cells over large areas.
pub const MAX_PLANNED_RESOLUTION: u8 = 11;

/// The finest end of a plan is never coarser than this.
pub const MIN_FINEST_RESOLUTION: u8 = 3;

/// Plan the resolutions for a cell-area range.
///
/// `min_area_km2` maps to the finest resolution and `max_area_km2` to the
/// coarsest; a reversed pair is accepted. The finest end is clamped to
/// [3, 11] and the coarsest to [0, 11].
///
/// When `count` covers the whole clamped range every resolution in it is
/// returned. Otherwise `count` resolutions are spread evenly across the range
/// with step `(span - 1) / (count - 1)`, rounded, so both ends are hit and the
/// plan holds exactly `count` entries. A step of `span / count` plus both ends
/// could return more than asked for. A count of one still yields both ends
/// of a multi-resolution range.
///
/// The result is sorted ascending, duplicate-free and never empty.
///
/// # Errors
///
/// [`GridError::InvalidConfiguration`] when `count` is not positive or either
/// area is not a positive finite number.
pub fn plan(min_area_km2: f64, max_area_km2: f64, count: i64) -> Result<Vec<u8>, GridError> {
    if count <= 0 {
        return Err(GridError::invalid_config(format!(
            "resolution count must be positive, got {}",
            count
        )));
    }
    for (name, value) in [("min_cell_area_km2", min_area_km2), ("max_cell_area_km2", max_area_km2)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(GridError::invalid_config(format!(
                "{} must be a positive number, got {}",
                name, value
            )));
        }
    }

    let mut finest = nearest_resolution_for_area(min_area_km2);
    let mut coarsest = nearest_resolution_for_area(max_area_km2);
    if finest < coarsest {
        std::mem::swap(&mut finest, &mut coarsest);
    }

    let finest = finest.clamp(MIN_FINEST_RESOLUTION, MAX_PLANNED_RESOLUTION);
    let coarsest = coarsest.clamp(MIN_RESOLUTION, MAX_PLANNED_RESOLUTION).min(finest);

    let span = (finest - coarsest) as i64 + 1;
    if count >= span {
        return Ok((coarsest..=finest).collect());
    }
    if count == 1 {
        return Ok(vec![coarsest, finest]);
    }

    let step = (span - 1) as f64 / (count - 1) as f64;
    let mut resolutions: Vec<u8> = (0..count)
        .map(|i| coarsest + (i as f64 * step).round() as u8)
        .collect();
    resolutions.push(coarsest);
    resolutions.push(finest);
    resolutions.sort_unstable();
    resolutions.dedup();

    Ok(resolutions)
}
