//! Static H3 resolution tables.
//!
//! Both tables are process-wide constants: the approximate average hexagon
//! area per resolution, and the suggested resolution for each representative
//! web-map zoom level.

/// Lowest H3 resolution.
pub const MIN_RESOLUTION: u8 = 0;

/// Highest H3 resolution.
pub const MAX_RESOLUTION: u8 = 15;

/// Approximate hexagon area in km², indexed by resolution (0-15).
pub const RESOLUTION_AREAS_KM2: [f64; 16] = [
    4_357_449.416,
    609_788.442,
    86_801.780,
    12_393.435,
    1_770.348,
    252.904,
    36.129,
    5.161,
    0.737,
    0.105,
    0.015,
    0.002_15,
    0.000_307,
    0.000_043_9,
    0.000_006_27,
    0.000_000_895,
];

/// Suggested resolution per map zoom level, as `(zoom, resolution)` pairs.
pub const ZOOM_RESOLUTIONS: [(u8, u8); 16] = [
    (5, 3),
    (6, 4),
    (7, 5),
    (8, 6),
    (9, 7),
    (10, 8),
    (11, 9),
    (12, 10),
    (13, 11),
    (14, 12),
    (15, 12),
    (16, 13),
    (17, 13),
    (18, 14),
    (19, 14),
    (20, 15),
];

/// Approximate hexagon area for a resolution, or `None` above 15.
pub fn resolution_area_km2(resolution: u8) -> Option<f64> {
    RESOLUTION_AREAS_KM2.get(resolution as usize).copied()
}

/// Suggested resolution for a zoom level present in [`ZOOM_RESOLUTIONS`].
pub fn zoom_table_resolution(zoom: u8) -> Option<u8> {
    ZOOM_RESOLUTIONS
        .iter()
        .find(|(z, _)| *z == zoom)
        .map(|(_, res)| *res)
}

/// Resolution whose average cell area is closest to `target_km2`.
///
/// Ties resolve to the lower resolution.
pub fn nearest_resolution_for_area(target_km2: f64) -> u8 {
    let mut best = 0u8;
    let mut best_diff = f64::INFINITY;

    for (res, area) in RESOLUTION_AREAS_KM2.iter().enumerate() {
        let diff = (area - target_km2).abs();
        if diff < best_diff {
            best_diff = diff;
            best = res as u8;
        }
    }

    best
}

/// Format an area for display: km² at or above 1 km², whole m² below.
pub fn format_area_km2(area_km2: f64) -> String {
    if area_km2 >= 1.0 {
        format!("{:.2} km²", area_km2)
    } else {
        let m2 = (area_km2 * 1_000_000.0).round() as u64;
        format!("{} m²", group_thousands(m2))
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
