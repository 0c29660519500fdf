//! Data models for the SQL Studio gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod assignment;
pub mod attempt;
pub mod connection;
pub mod query;

// Re-export commonly used types
pub use assignment::{Assignment, Difficulty, Hint, SampleTable};
pub use attempt::{AttemptStats, AttemptTotals, QueryAttempt};
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{
    ColumnDescriptor, DEFAULT_MAX_QUERY_LENGTH, DEFAULT_STATEMENT_TIMEOUT_MS, ExecuteRequest,
    ExecutionError, ExecutionOutcome, QueryResult,
};
