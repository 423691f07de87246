//! Domain data access seam.

use async_trait::async_trait;
use serde_json::Value;

use super::BackendError;

// == Time Window ==
/// Inclusive range of Unix timestamps (seconds) for time-bounded queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// Window of `seconds` ending at `end`.
    pub fn ending_at(end: i64, seconds: u64) -> Self {
        let span = i64::try_from(seconds).unwrap_or(i64::MAX);
        Self {
            start: end.saturating_sub(span),
            end,
        }
    }

    /// Window of `seconds` ending now.
    pub fn trailing(seconds: u64) -> Self {
        Self::ending_at(chrono::Utc::now().timestamp(), seconds)
    }
}

// == Report Source ==
/// Read access to the disaster report store.
///
/// Each method yields a GeoJSON value (normally a FeatureCollection), or
/// `None` when the store has nothing to return.
#[async_trait]
pub trait ReportSource: Send + Sync + 'static {
    /// Confirmed reports created inside `window`.
    async fn confirmed_reports(&self, window: TimeWindow) -> Result<Option<Value>, BackendError>;

    /// One confirmed report by primary key.
    async fn confirmed_report(&self, id: i64) -> Result<Option<Value>, BackendError>;

    /// IoT flood sensor readings inside `window`.
    async fn smart_sensors(&self, window: TimeWindow) -> Result<Option<Value>, BackendError>;

    /// Flood gauge readings inside `window`, read from `table`.
    async fn flood_gauges(&self, window: TimeWindow, table: &str) -> Result<Option<Value>, BackendError>;

    /// A static infrastructure layer stored in `table`.
    async fn infrastructure(&self, table: &str) -> Result<Option<Value>, BackendError>;

    /// Report counts per city area inside `window`, optionally for one area.
    async fn reports_by_area(
        &self,
        window: TimeWindow,
        area_name: Option<&str>,
    ) -> Result<Option<Value>, BackendError>;
}

// == Probe ==
/// Cheap liveness check against the store.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn ping(&self) -> Result<(), BackendError>;
}
