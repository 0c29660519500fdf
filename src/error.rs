//! Error types for the SQL Studio gateway.
//!
//! All fallible operations return [`GatewayError`], built with `thiserror`.
//! Variants fall into the classes the HTTP layer cares about: client
//! rejections (backend rejection, timeout) and everything else,
//! which is treated as an opaque server fault.

use std::time::Duration;
use thiserror::Error;

/// SQLSTATE raised by PostgreSQL when `statement_timeout` cancels a query.
const PG_QUERY_CANCELED: &str = "57014";

/// SQLite result code for a statement stopped by the progress handler.
const SQLITE_INTERRUPT: &str = "9";

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Query cancelled: statement timeout of {budget_ms} ms exceeded")]
    StatementTimeout { budget_ms: u64 },

    #[error("Failed to persist query attempt: {message}")]
    Persistence { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a backend execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a statement timeout error for the given budget.
    pub fn statement_timeout(budget: Duration) -> Self {
        Self::StatementTimeout {
            budget_ms: budget.as_millis() as u64,
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}

/// Convert sqlx errors to GatewayError.
///
/// Only `sqlx::Error::Database` represents the backend rejecting the query
/// itself; every other variant is an infrastructure fault.
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                if matches!(code.as_deref(), Some(PG_QUERY_CANCELED | SQLITE_INTERRUPT)) {
                    // Budget is unknown at this level; the executor reports its own.
                    return GatewayError::StatementTimeout { budget_ms: 0 };
                }
                GatewayError::execution(db_err.message(), code)
            }
            sqlx::Error::Configuration(msg) => GatewayError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::PoolTimedOut => GatewayError::connection(
                "Timed out acquiring a backend connection",
                "Increase acquire_timeout or the pool size",
            ),
            sqlx::Error::PoolClosed => GatewayError::PoolClosed,
            sqlx::Error::Io(io_err) => GatewayError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => GatewayError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => GatewayError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                GatewayError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                GatewayError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => GatewayError::internal("Database worker crashed"),
            _ => GatewayError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
