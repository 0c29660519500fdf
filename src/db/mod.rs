//! Database layer.
//!
//! - `pool`: bounded session pool over the backend engine
//! - `executor`: statement execution with a time budget
//! - `types`: row decoding into JSON
//! - `attempts`: stores for attempt telemetry

pub mod attempts;
pub mod executor;
pub mod pool;
pub mod types;

pub use attempts::{AttemptStore, MemoryAttemptStore, SqlAttemptStore};
pub use executor::QueryExecutor;
pub use pool::{DbPool, Session, SessionConnection, SessionPool};
