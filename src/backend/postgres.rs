//! PostgreSQL/PostGIS adapter.
//!
//! Each query builds its GeoJSON inside the database and returns a single
//! JSON value. Table names come from configuration and are validated as
//! plain identifiers before they get here.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::connection::Connection;
use sqlx_core::pool::PoolOptions;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgConnection, PgPool, Postgres};
use tracing::{debug, info};

use super::{BackendError, Probe, ReportSource, TimeWindow};
use crate::monitor::{Connector, FailureSignal};

/// Type alias for PostgreSQL pool options.
pub type PgPoolOptions = PoolOptions<Postgres>;

/// Wraps a row-producing `SELECT` into a single FeatureCollection value.
fn feature_collection(features_sql: &str) -> String {
    format!(
        "SELECT row_to_json(fc) FROM (\
         SELECT 'FeatureCollection' AS type, \
         COALESCE(array_to_json(array_agg(f)), '[]'::json) AS features \
         FROM ({features_sql}) AS f) AS fc"
    )
}

pub(crate) fn confirmed_reports_sql(reports: &str) -> String {
    feature_collection(&format!(
        "SELECT 'Feature' AS type, ST_AsGeoJSON(r.the_geom)::json AS geometry, \
         json_build_object('pkey', r.pkey, 'created_at', r.created_at, 'source', r.source, \
         'status', r.status, 'url', r.url, 'image_url', r.image_url, 'title', r.title, \
         'text', r.text) AS properties \
         FROM {reports} AS r \
         WHERE r.created_at >= to_timestamp($1::bigint) AND r.created_at <= to_timestamp($2::bigint) \
         ORDER BY r.created_at DESC LIMIT $3"
    ))
}

pub(crate) fn confirmed_report_sql(reports: &str) -> String {
    format!(
        "SELECT json_build_object('type', 'FeatureCollection', 'features', json_build_array(\
         json_build_object('type', 'Feature', 'geometry', ST_AsGeoJSON(r.the_geom)::json, \
         'properties', json_build_object('pkey', r.pkey, 'created_at', r.created_at, \
         'source', r.source, 'status', r.status, 'url', r.url, 'image_url', r.image_url, \
         'title', r.title, 'text', r.text)))) \
         FROM {reports} AS r WHERE r.pkey = $1"
    )
}

pub(crate) fn smart_sensors_sql(data: &str, metadata: &str) -> String {
    feature_collection(&format!(
        "SELECT 'Feature' AS type, ST_AsGeoJSON(m.the_geom)::json AS geometry, \
         json_build_object('id', m.id, 'name', m.name, 'observations', (\
         SELECT COALESCE(array_to_json(array_agg(row_to_json(d) ORDER BY d.measurement_time)), '[]'::json) \
         FROM (SELECT sd.measurement_time, sd.distance, sd.temperature, sd.humidity \
         FROM {data} AS sd WHERE sd.sensor_id = m.id \
         AND sd.measurement_time >= to_timestamp($1::bigint) \
         AND sd.measurement_time <= to_timestamp($2::bigint)) AS d)) AS properties \
         FROM {metadata} AS m"
    ))
}

pub(crate) fn flood_gauges_sql(gauges: &str) -> String {
    feature_collection(&format!(
        "SELECT 'Feature' AS type, ST_AsGeoJSON(g.the_geom)::json AS geometry, \
         json_build_object('gaugeid', g.gaugeid, 'gaugenameid', g.gaugenameid, 'observations', \
         array_to_json(array_agg(json_build_object('measuredatetime', g.measuredatetime, \
         'depth', g.depth, 'warninglevel', g.warninglevel, 'warningnameid', g.warningnameid) \
         ORDER BY g.measuredatetime ASC))) AS properties \
         FROM {gauges} AS g \
         WHERE g.measuredatetime >= to_timestamp($1::bigint) AND g.measuredatetime <= to_timestamp($2::bigint) \
         GROUP BY g.gaugeid, g.gaugenameid, g.the_geom"
    ))
}

pub(crate) fn infrastructure_sql(table: &str) -> String {
    feature_collection(&format!(
        "SELECT 'Feature' AS type, ST_AsGeoJSON(i.the_geom)::json AS geometry, \
         json_build_object('name', i.name) AS properties FROM {table} AS i"
    ))
}

pub(crate) fn reports_by_area_sql(polygons: &str, reports: &str) -> String {
    feature_collection(&format!(
        "SELECT 'Feature' AS type, ST_AsGeoJSON(p.the_geom)::json AS geometry, \
         json_build_object('area_name', p.area_name, 'count', count(r.pkey)) AS properties \
         FROM {polygons} AS p LEFT JOIN {reports} AS r ON ST_Within(r.the_geom, p.the_geom) \
         AND r.created_at >= to_timestamp($1::bigint) AND r.created_at <= to_timestamp($2::bigint) \
         WHERE ($3::text IS NULL OR p.area_name = $3) \
         GROUP BY p.pkey, p.area_name, p.the_geom"
    ))
}

// == Pool ==
/// Creates the shared connection pool.
///
/// Connections are opened on demand; reachability is checked separately at
/// startup through the [`PgConnector`].
pub fn create_pool(url: &str, pool_size: u32, acquire_timeout: Duration) -> Result<PgPool, BackendError> {
    info!(
        pool_size,
        acquire_timeout_ms = acquire_timeout.as_millis() as u64,
        "Creating PostgreSQL connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(pool_size)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(url)
        .map_err(BackendError::from)?;

    Ok(pool)
}

/// Runs `SELECT 1` on the pool.
pub async fn ping(pool: &PgPool) -> Result<(), BackendError> {
    query("SELECT 1").execute(pool).await?;
    debug!("Backend ping successful");
    Ok(())
}

#[async_trait]
impl Probe for PgPool {
    async fn ping(&self) -> Result<(), BackendError> {
        ping(self).await
    }
}

// == Tables ==
/// Table names used by the report queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgTables {
    pub reports: String,
    pub sensor_data: String,
    pub sensor_metadata: String,
    pub city_polygons: String,
}

// == Report Source ==
/// [`ReportSource`] backed by the shared pool.
///
/// Connection-class failures are forwarded to the connection monitor before
/// being returned to the caller.
pub struct PgReportSource {
    pool: PgPool,
    tables: PgTables,
    limit: i64,
    failure: FailureSignal,
}

impl PgReportSource {
    pub fn new(pool: PgPool, tables: PgTables, limit: i64, failure: FailureSignal) -> Self {
        Self {
            pool,
            tables,
            limit,
            failure,
        }
    }

    fn classify(&self, err: sqlx_core::error::Error) -> BackendError {
        let err = BackendError::from(err);
        if err.is_connection_loss() {
            debug!(error = %err, "Query failed on a lost backend connection");
            self.failure.connection_lost(err.to_string());
        }
        err
    }

    async fn fetch_window(&self, sql: &str, window: TimeWindow) -> Result<Option<Value>, BackendError> {
        query_scalar(sql)
            .bind(window.start)
            .bind(window.end)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(e))
    }
}

#[async_trait]
impl ReportSource for PgReportSource {
    async fn confirmed_reports(&self, window: TimeWindow) -> Result<Option<Value>, BackendError> {
        let sql = confirmed_reports_sql(&self.tables.reports);
        query_scalar(&sql)
            .bind(window.start)
            .bind(window.end)
            .bind(self.limit)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn confirmed_report(&self, id: i64) -> Result<Option<Value>, BackendError> {
        let sql = confirmed_report_sql(&self.tables.reports);
        query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn smart_sensors(&self, window: TimeWindow) -> Result<Option<Value>, BackendError> {
        let sql = smart_sensors_sql(&self.tables.sensor_data, &self.tables.sensor_metadata);
        self.fetch_window(&sql, window).await
    }

    async fn flood_gauges(&self, window: TimeWindow, table: &str) -> Result<Option<Value>, BackendError> {
        let sql = flood_gauges_sql(table);
        self.fetch_window(&sql, window).await
    }

    async fn infrastructure(&self, table: &str) -> Result<Option<Value>, BackendError> {
        let sql = infrastructure_sql(table);
        query_scalar(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn reports_by_area(
        &self,
        window: TimeWindow,
        area_name: Option<&str>,
    ) -> Result<Option<Value>, BackendError> {
        let sql = reports_by_area_sql(&self.tables.city_polygons, &self.tables.reports);
        query_scalar(&sql)
            .bind(window.start)
            .bind(window.end)
            .bind(area_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(e))
    }
}

// == Connector ==
/// Opens (and immediately closes) a standalone connection to prove the
/// server is reachable again. The pool reconnects on its own once it is.
pub struct PgConnector {
    url: String,
}

impl PgConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<(), BackendError> {
        let mut conn = PgConnection::connect(&self.url).await?;
        conn.ping().await?;
        if let Err(e) = conn.close().await {
            debug!(error = %e, "Closing probe connection failed");
        }
        Ok(())
    }
}
