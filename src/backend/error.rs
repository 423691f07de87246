//! Backend error classification.

use sqlx_core::error::Error as SqlxError;
use thiserror::Error;

/// SQLSTATE class for connection exceptions.
const PG_CONNECTION_EXCEPTION_CLASS: &str = "08";

/// SQLSTATE codes raised when the server goes away (admin/crash/cannot connect now).
const PG_SHUTDOWN_CODES: [&str; 3] = ["57P01", "57P02", "57P03"];

// == Backend Error ==
#[derive(Error, Debug)]
pub enum BackendError {
    /// The store is unreachable; the connection monitor should take over
    #[error("Backend connection error: {0}")]
    Connection(String),

    /// The store answered but the query failed
    #[error("Backend query error: {0}")]
    Query(String),
}

impl BackendError {
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, BackendError::Connection(_))
    }
}

impl From<SqlxError> for BackendError {
    fn from(err: SqlxError) -> Self {
        if is_connection_error(&err) {
            BackendError::Connection(err.to_string())
        } else {
            BackendError::Query(err.to_string())
        }
    }
}

/// True for errors that mean the connection itself is unusable.
pub fn is_connection_error(err: &SqlxError) -> bool {
    match err {
        SqlxError::Io(_)
        | SqlxError::Tls(_)
        | SqlxError::Protocol(_)
        | SqlxError::PoolTimedOut
        | SqlxError::PoolClosed
        | SqlxError::WorkerCrashed => true,
        SqlxError::Database(db_err) => db_err.code().map_or(false, |code| {
            code.starts_with(PG_CONNECTION_EXCEPTION_CLASS)
                || PG_SHUTDOWN_CODES.iter().any(|shutdown| *shutdown == code)
        }),
        _ => false,
    }
}
