//! Backend Module
//!
//! Access to the relational report store: the [`ReportSource`] seam used by
//! request handlers and its PostgreSQL implementation.

mod error;
pub mod postgres;
mod source;

pub use error::{is_connection_error, BackendError};
pub use postgres::{PgConnector, PgReportSource, PgTables};
pub use source::{Probe, ReportSource, TimeWindow};
