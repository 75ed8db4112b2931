//! PostGIS-backed grid store.
//!
//! Tables used (SRID 4326 throughout):
//!
//! - `projects (id, boundary_geom)`
//! - `project_areas (id, project_id, boundary_geom, min_cell_area_km2,
//!   max_cell_area_km2, num_resolutions, grids_generated)`
//! - `project_grid_cells (id, project_id, area_id, h3_index, resolution, geometry)`
//!
//! Geometries cross the wire as GeoJSON text (`ST_AsGeoJSON`) on the way out
//! and as WKT (`ST_GeomFromText`) on the way in. Tiles are produced by the
//! database with `ST_AsMVT`.

use async_trait::async_trait;
use bytes::Bytes;
use geo_types::MultiPolygon;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::geometry::{multi_polygon_to_geojson, polygon_to_wkt, BoundaryGeometry};
use crate::tile::{TileBounds, LAYER_NAME, TILE_BUFFER, TILE_EXTENT};

use super::{
    AreaRecord, CellFilter, CellRecord, GridScope, GridStore, NewGridCell, ProjectRecord,
    ResolutionCount,
};

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PostgisOptions {
    pub max_connections: u32,
}

impl Default for PostgisOptions {
    fn default() -> Self {
        Self { max_connections: 10 }
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct AreaRow {
    id: Uuid,
    project_id: Uuid,
    boundary: Option<String>,
    min_cell_area_km2: Option<f64>,
    max_cell_area_km2: Option<f64>,
    num_resolutions: Option<i32>,
    grids_generated: Option<bool>,
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: Uuid,
    boundary: Option<String>,
}

#[derive(Debug, FromRow)]
struct ResolutionRow {
    resolution: i32,
    count: i64,
}

#[derive(Debug, FromRow)]
struct CellRow {
    h3_index: String,
    resolution: i32,
    area_id: Option<Uuid>,
    geojson: String,
}

impl CellRow {
    fn into_record(self) -> Result<CellRecord, StoreError> {
        let boundary = match BoundaryGeometry::from_geojson_str(&self.geojson) {
            Ok(BoundaryGeometry::Polygon(polygon)) => polygon,
            Ok(other) => {
                return Err(StoreError::Decode(format!(
                    "cell {} has a {} geometry",
                    self.h3_index,
                    other.kind()
                )))
            }
            Err(e) => return Err(StoreError::Decode(e.to_string())),
        };
        Ok(CellRecord {
            resolution: decode_resolution(self.resolution)?,
            h3_index: self.h3_index,
            area_id: self.area_id,
            boundary,
        })
    }
}

fn decode_resolution(value: i32) -> Result<u8, StoreError> {
    u8::try_from(value)
        .ok()
        .filter(|r| *r <= 15)
        .ok_or_else(|| StoreError::Decode(format!("resolution {} out of range", value)))
}

fn decode_boundary(text: Option<String>) -> Result<Option<BoundaryGeometry>, StoreError> {
    text.map(|t| BoundaryGeometry::from_geojson_str(&t))
        .transpose()
        .map_err(|e| StoreError::Decode(e.to_string()))
}

fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_) => StoreError::Connection(e.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(e.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

/// Append the `WHERE` clause selecting the cells of `filter`.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &CellFilter) {
    match *filter {
        CellFilter::Area(area_id) => {
            builder.push(" WHERE area_id = ").push_bind(area_id);
        }
        CellFilter::Project {
            project_id,
            area_id,
        } => {
            builder.push(" WHERE project_id = ").push_bind(project_id);
            if let Some(area_id) = area_id {
                builder.push(" AND area_id = ").push_bind(area_id);
            }
        }
    }
}

fn push_envelope(builder: &mut QueryBuilder<'_, Postgres>, bounds: &TileBounds) {
    builder
        .push("ST_MakeEnvelope(")
        .push_bind(bounds.xmin)
        .push(", ")
        .push_bind(bounds.ymin)
        .push(", ")
        .push_bind(bounds.xmax)
        .push(", ")
        .push_bind(bounds.ymax)
        .push(", 3857)");
}

// =============================================================================
// PostgisGridStore
// =============================================================================

/// Grid store over a PostgreSQL/PostGIS connection pool.
#[derive(Clone)]
pub struct PostgisGridStore {
    pool: PgPool,
}

impl PostgisGridStore {
    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, options: PostgisOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(
            max_connections = options.max_connections,
            "Connected to PostGIS"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GridStore for PostgisGridStore {
    async fn area(&self, area_id: Uuid) -> Result<Option<AreaRecord>, StoreError> {
        let row = sqlx::query_as::<_, AreaRow>(
            "SELECT id, project_id, ST_AsGeoJSON(boundary_geom) AS boundary, \
             min_cell_area_km2, max_cell_area_km2, num_resolutions, grids_generated \
             FROM project_areas WHERE id = $1",
        )
        .bind(area_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(|row| {
            Ok(AreaRecord {
                id: row.id,
                project_id: row.project_id,
                boundary: decode_boundary(row.boundary)?,
                min_cell_area_km2: row.min_cell_area_km2,
                max_cell_area_km2: row.max_cell_area_km2,
                num_resolutions: row.num_resolutions,
                grids_generated: row.grids_generated.unwrap_or(false),
            })
        })
        .transpose()
    }

    async fn project(&self, project_id: Uuid) -> Result<Option<ProjectRecord>, StoreError> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, ST_AsGeoJSON(boundary_geom) AS boundary FROM projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(|row| {
            Ok(ProjectRecord {
                id: row.id,
                boundary: decode_boundary(row.boundary)?,
            })
        })
        .transpose()
    }

    async fn delete_cells(&self, scope: &GridScope) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM project_grid_cells \
             WHERE project_id = $1 AND area_id IS NOT DISTINCT FROM $2",
        )
        .bind(scope.project_id)
        .bind(scope.area_id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected())
    }

    async fn insert_cells(&self, scope: &GridScope, cells: &[NewGridCell]) -> Result<(), StoreError> {
        if cells.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO project_grid_cells (id, project_id, area_id, h3_index, resolution, geometry) ",
        );
        builder.push_values(cells, |mut row, cell| {
            row.push_bind(Uuid::new_v4())
                .push_bind(scope.project_id)
                .push_bind(scope.area_id)
                .push_bind(cell.h3_index.clone())
                .push_bind(cell.resolution as i32)
                .push("ST_GeomFromText(")
                .push_bind_unseparated(polygon_to_wkt(&cell.boundary))
                .push_unseparated(", 4326)");
        });

        let mut tx = self.pool.begin().await.map_err(store_error)?;
        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        tx.commit().await.map_err(store_error)?;

        debug!(cells = cells.len(), scope = %scope, "Committed cell batch");
        Ok(())
    }

    async fn mark_grids_generated(&self, area_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE project_areas SET grids_generated = TRUE WHERE id = $1")
            .bind(area_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn resolutions(&self, filter: &CellFilter) -> Result<Vec<ResolutionCount>, StoreError> {
        let mut builder =
            QueryBuilder::new("SELECT resolution, COUNT(*) AS count FROM project_grid_cells");
        push_filter(&mut builder, filter);
        builder.push(" GROUP BY resolution ORDER BY resolution");

        let rows: Vec<ResolutionRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(ResolutionCount {
                    resolution: decode_resolution(row.resolution)?,
                    count: row.count.max(0) as u64,
                })
            })
            .collect()
    }

    async fn cells(
        &self,
        filter: &CellFilter,
        resolution: Option<u8>,
    ) -> Result<Vec<CellRecord>, StoreError> {
        let mut builder = QueryBuilder::new(
            "SELECT h3_index, resolution, area_id, ST_AsGeoJSON(geometry) AS geojson \
             FROM project_grid_cells",
        );
        push_filter(&mut builder, filter);
        if let Some(resolution) = resolution {
            builder
                .push(" AND resolution = ")
                .push_bind(resolution as i32);
        }
        builder.push(" ORDER BY resolution, h3_index");

        let rows: Vec<CellRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter().map(CellRow::into_record).collect()
    }

    async fn union_of_cells(
        &self,
        filter: &CellFilter,
        h3_indices: &[String],
    ) -> Result<Option<MultiPolygon<f64>>, StoreError> {
        let mut builder = QueryBuilder::new(
            "SELECT ST_AsGeoJSON(ST_Multi(ST_CollectionExtract(ST_Union(geometry), 3))) \
             FROM project_grid_cells",
        );
        push_filter(&mut builder, filter);
        builder
            .push(" AND h3_index = ANY(")
            .push_bind(h3_indices.to_vec())
            .push(")");

        let union: Option<String> = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        union
            .map(|text| {
                BoundaryGeometry::from_geojson_str(&text)
                    .map(BoundaryGeometry::into_multi_polygon)
                    .map_err(|e| StoreError::Decode(e.to_string()))
            })
            .transpose()
            .map(|union| union.filter(|m| !m.0.is_empty()))
    }

    async fn cells_intersecting(
        &self,
        filter: &CellFilter,
        resolution: u8,
        geometry: &MultiPolygon<f64>,
    ) -> Result<Vec<CellRecord>, StoreError> {
        let mut builder = QueryBuilder::new(
            "SELECT h3_index, resolution, area_id, ST_AsGeoJSON(geometry) AS geojson \
             FROM project_grid_cells",
        );
        push_filter(&mut builder, filter);
        builder
            .push(" AND resolution = ")
            .push_bind(resolution as i32)
            .push(" AND ST_Intersects(geometry, ST_SetSRID(ST_GeomFromGeoJSON(")
            .push_bind(multi_polygon_to_geojson(geometry).to_string())
            .push("), 4326)) ORDER BY h3_index");

        let rows: Vec<CellRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter().map(CellRow::into_record).collect()
    }

    async fn render_tile(
        &self,
        filter: &CellFilter,
        resolution: u8,
        bounds: &TileBounds,
    ) -> Result<Option<Bytes>, StoreError> {
        let mut builder = QueryBuilder::new("SELECT ST_AsMVT(tile, ");
        builder
            .push_bind(LAYER_NAME)
            .push(", ")
            .push_bind(TILE_EXTENT as i32)
            .push(", 'geom') FROM (SELECT h3_index, area_id::text AS area_id, ST_AsMVTGeom(ST_Transform(geometry, 3857), ");
        push_envelope(&mut builder, bounds);
        builder
            .push(", ")
            .push_bind(TILE_EXTENT as i32)
            .push(", ")
            .push_bind(TILE_BUFFER as i32)
            .push(", true) AS geom FROM project_grid_cells");
        push_filter(&mut builder, filter);
        builder
            .push(" AND resolution = ")
            .push_bind(resolution as i32)
            .push(" AND geometry && ST_Transform(");
        push_envelope(&mut builder, bounds);
        builder.push(", 4326)) AS tile WHERE geom IS NOT NULL");

        let data: Option<Vec<u8>> = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(data.filter(|d| !d.is_empty()).map(Bytes::from))
    }
}
