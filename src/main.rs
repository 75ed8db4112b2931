//! hexgrid-server - multi-resolution H3 grids as GeoJSON and vector tiles.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hexgrid_server::{
    config::{Cli, Command, PlanConfig, ServeConfig},
    grid::{format_area_km2, plan, resolution_area_km2},
    server::{create_router, AppState, RouterConfig},
    store::{GridStore, InMemoryGridStore, PostgisGridStore},
    tile::TileCache,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Plan(config) => run_plan(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("hexgrid-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!(
        "  Generation: batches of {} cells, heartbeat every {}s",
        config.batch_size, config.heartbeat_secs
    );
    info!(
        "  Tile cache: {}MB, max-age {}s",
        config.cache_tiles / (1024 * 1024),
        config.cache_max_age
    );

    match config.resolved_database_url() {
        Some(url) => {
            info!("Connecting to PostGIS...");
            match PostgisGridStore::connect(&url, config.postgis_options()).await {
                Ok(store) => serve(Arc::new(store), &config).await,
                Err(e) => {
                    error!("  Failed to connect to the database: {}", e);
                    error!("  Check --database-url / HEXGRID_DATABASE_URL");
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            warn!("  Datastore: IN-MEMORY - grids are lost on restart");
            warn!("        Persist grids with --database-url=postgres://...");
            serve(Arc::new(InMemoryGridStore::new()), &config).await
        }
    }
}

async fn serve<S: GridStore>(store: Arc<S>, config: &ServeConfig) -> ExitCode {
    let tile_cache = Arc::new(TileCache::with_capacity(config.cache_tiles));
    let state = AppState::with_parts(store, config.generator_config(), tile_cache);
    let router = create_router(state, build_router_config(config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/grids/resolution-info", addr);
    info!("    curl -X POST http://{}/grids/area/<area_id>/generate", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "hexgrid_server=debug,tower_http=debug"
    } else {
        "hexgrid_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Plan Command
// =============================================================================

fn run_plan(config: PlanConfig) -> ExitCode {
    let resolutions = match plan(config.min_area, config.max_area, config.count) {
        Ok(resolutions) => resolutions,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Cell area {} to {} in {} resolution(s):",
        format_area_km2(config.min_area),
        format_area_km2(config.max_area),
        config.count
    );
    for resolution in resolutions {
        let area = resolution_area_km2(resolution).unwrap_or(0.0);
        println!("  resolution {:>2}  ~{}", resolution, format_area_km2(area));
    }

    ExitCode::SUCCESS
}
