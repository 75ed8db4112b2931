//! Spherical Web Mercator (EPSG:3857) projection.

use std::f64::consts::PI;

/// WGS84 semi-major axis used by the spherical projection, in metres.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Full projected world width, in metres.
pub const WORLD_EXTENT: f64 = 40_075_016.685_578_49;

/// Half of [`WORLD_EXTENT`]; projected x/y range is `[-HALF_WORLD, HALF_WORLD]`.
pub const HALF_WORLD: f64 = 20_037_508.342_789_244;

/// Latitude limit at which the projection is square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Project geographic coordinates (degrees) to Web Mercator metres.
///
/// Latitudes beyond [`MAX_LATITUDE`] are clamped so the result stays finite.
pub fn lnglat_to_mercator(lng: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS * lng.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Unproject Web Mercator metres to geographic coordinates (degrees).
pub fn mercator_to_lnglat(x: f64, y: f64) -> (f64, f64) {
    let lng = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lng, lat)
}
