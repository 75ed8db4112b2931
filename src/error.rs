use thiserror::Error;

/// Errors returned by the spatial datastore backing the grid cells.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A query or commit was rejected by the datastore
    #[error("Query failed: {0}")]
    Query(String),

    /// The datastore could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// A row came back in a shape we cannot interpret
    #[error("Decode error: {0}")]
    Decode(String),

    /// Cells could not be encoded into a vector tile
    #[error("Tile encoding failed: {0}")]
    Encode(String),
}

/// Errors raised while reading or converting geometries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The GeoJSON document could not be parsed
    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    /// Only Polygon and MultiPolygon boundaries can be tessellated
    #[error("Unsupported geometry type: {0}")]
    UnsupportedType(String),

    /// A ring has a position with fewer than two coordinates or non-finite values
    #[error("Invalid ring: {message}")]
    InvalidRing { message: String },

    /// A hexagon index string is not a valid H3 cell
    #[error("Invalid cell index: {0}")]
    InvalidCellIndex(String),
}

/// Errors surfaced by the grid planning, generation and serving layers.
#[derive(Debug, Clone, Error)]
pub enum GridError {
    /// Resolution count or area bounds rejected before any persistence
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Area or project is missing, or has no boundary
    #[error("{target} not found")]
    TargetNotFound { target: String },

    /// Boundary geometry could not be used
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// No cells exist for the requested resolution or zoom
    #[error("No grid data available")]
    NoDataAvailable,

    /// Datastore query or commit failure
    #[error("Datastore error: {0}")]
    Datastore(#[from] StoreError),

    /// Another generation run holds the same scope
    #[error("Grid generation already running for {target}")]
    GenerationInProgress { target: String },

    /// Tile address outside the tile pyramid
    #[error("Invalid tile {z}/{x}/{y}")]
    InvalidTile { z: u8, x: u32, y: u32 },
}

impl GridError {
    /// Shorthand for [`GridError::InvalidConfiguration`].
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        GridError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}
