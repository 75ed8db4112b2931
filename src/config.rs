//! Configuration management for the grid server.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `HEXGRID_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Commands
//!
//! - `serve` - Run the HTTP server
//! - `plan` - Print the resolutions a cell-area range produces
//!
//! # Environment Variables
//!
//! - `HEXGRID_HOST` - Server bind address (default: 0.0.0.0)
//! - `HEXGRID_PORT` - Server port (default: 3000)
//! - `HEXGRID_DATABASE_URL` / `DATABASE_URL` - PostGIS connection string
//! - `HEXGRID_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `HEXGRID_BATCH_SIZE` - Cells per committed batch (default: 2000)
//! - `HEXGRID_HEARTBEAT_SECS` - Quiet period before a heartbeat (default: 5)
//! - `HEXGRID_CACHE_TILES` - Tile cache size in bytes (default: 64MB)
//! - `HEXGRID_CACHE_MAX_AGE` - Tile Cache-Control max-age (default: 3600)
//! - `HEXGRID_CORS_ORIGINS` - Comma-separated allowed origins

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::generate::{
    GeneratorConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_CELL_AREA_KM2, DEFAULT_MIN_CELL_AREA_KM2,
    DEFAULT_NUM_RESOLUTIONS, MAX_BATCH_SIZE, MIN_BATCH_SIZE,
};
use crate::store::PostgisOptions;
use crate::tile::DEFAULT_TILE_CACHE_CAPACITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default database pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Default heartbeat period in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 5;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Fallback variable for the database URL.
pub const FALLBACK_DATABASE_URL_ENV: &str = "DATABASE_URL";

// =============================================================================
// CLI Arguments
// =============================================================================

/// hexgrid-server - multi-resolution H3 grids as GeoJSON and vector tiles.
#[derive(Parser, Debug, Clone)]
#[command(name = "hexgrid-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Print the resolution plan for a cell-area range.
    Plan(PlanConfig),
}

/// Options of the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "HEXGRID_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "HEXGRID_PORT")]
    pub port: u16,

    // =========================================================================
    // Datastore Configuration
    // =========================================================================
    /// PostGIS connection string.
    ///
    /// Falls back to `DATABASE_URL`. Without either, cells are kept in memory
    /// and lost on restart.
    #[arg(long, env = "HEXGRID_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum number of pooled database connections.
    #[arg(long, default_value_t = DEFAULT_DB_MAX_CONNECTIONS, env = "HEXGRID_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    // =========================================================================
    // Generation Configuration
    // =========================================================================
    /// Cells persisted per committed batch (100-5000).
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, env = "HEXGRID_BATCH_SIZE")]
    pub batch_size: usize,

    /// Seconds without progress before a heartbeat event (1-60).
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_SECS, env = "HEXGRID_HEARTBEAT_SECS")]
    pub heartbeat_secs: u64,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    /// Tile cache capacity in bytes.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "HEXGRID_CACHE_TILES")]
    pub cache_tiles: usize,

    /// HTTP Cache-Control max-age for tiles in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "HEXGRID_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "HEXGRID_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(format!(
                "batch_size must be between {} and {}",
                MIN_BATCH_SIZE, MAX_BATCH_SIZE
            ));
        }

        if !(1..=60).contains(&self.heartbeat_secs) {
            return Err("heartbeat_secs must be between 1 and 60".to_string());
        }

        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }

        if self.db_max_connections == 0 {
            return Err("db_max_connections must be greater than 0".to_string());
        }

        if let Some(url) = &self.database_url {
            if url.trim().is_empty() {
                return Err(
                    "database_url is empty. Unset HEXGRID_DATABASE_URL to use the in-memory store"
                        .to_string(),
                );
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The database URL from the flag or, failing that, `DATABASE_URL`.
    pub fn resolved_database_url(&self) -> Option<String> {
        self.database_url.clone().or_else(|| {
            std::env::var(FALLBACK_DATABASE_URL_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty())
        })
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new(self.batch_size, Duration::from_secs(self.heartbeat_secs))
    }

    pub fn postgis_options(&self) -> PostgisOptions {
        PostgisOptions {
            max_connections: self.db_max_connections,
        }
    }
}

/// Options of the `plan` command.
#[derive(Args, Debug, Clone)]
pub struct PlanConfig {
    /// Smallest cell area in km².
    #[arg(long, default_value_t = DEFAULT_MIN_CELL_AREA_KM2)]
    pub min_area: f64,

    /// Largest cell area in km².
    #[arg(long, default_value_t = DEFAULT_MAX_CELL_AREA_KM2)]
    pub max_area: f64,

    /// Number of resolutions.
    #[arg(long, default_value_t = DEFAULT_NUM_RESOLUTIONS)]
    pub count: i64,
}

// =============================================================================
// Tests
// =============================================================================
