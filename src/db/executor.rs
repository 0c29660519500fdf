//! Query execution engine.
//!
//! The executor takes one session from the [`SessionPool`], runs a single
//! sanitized statement under the statement budget, and classifies the result:
//!
//! - rows (or an empty result) become [`ExecutionOutcome::Succeeded`]
//! - a backend rejection becomes [`ExecutionOutcome::Failed`] with the
//!   backend's message
//! - exceeding the budget becomes [`ExecutionOutcome::TimedOut`]
//! - anything else (I/O, protocol, closed pool) is returned as `Err`
//!
//! The session goes back to the pool before the outcome is returned. Sessions
//! that timed out or faulted may be mid-protocol, so they are discarded.
//!
//! # Architecture
//!
//! Database-specific implementations live in the `postgres` and `sqlite`
//! submodules. PostgreSQL also enforces the budget server-side through
//! `statement_timeout`, SQLite through a progress handler that interrupts the
//! statement at the deadline. Both engines are also bounded by a client-side
//! timer.

use crate::db::pool::{SessionConnection, SessionPool};
use crate::db::types::{RowToJson, describe_columns};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{
    ColumnDescriptor, DEFAULT_STATEMENT_TIMEOUT_MS, ExecutionError, ExecutionOutcome, QueryResult,
};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, warn};

type JsonRow = serde_json::Map<String, serde_json::Value>;

/// Query executor that handles statement execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    statement_timeout: Duration,
}

impl QueryExecutor {
    /// Create a new query executor with the default 30 s budget.
    pub fn new() -> Self {
        Self {
            statement_timeout: Duration::from_millis(DEFAULT_STATEMENT_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(statement_timeout: Duration) -> Self {
        Self { statement_timeout }
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Run `sql` on a session from `pool`.
    ///
    /// Elapsed time includes any wait for a free session.
    pub async fn execute(&self, pool: &SessionPool, sql: &str) -> GatewayResult<ExecutionOutcome> {
        let start = Instant::now();
        let budget = self.statement_timeout;

        let mut session = pool.acquire().await?;

        debug!(
            sql = %sql,
            timeout_ms = budget.as_millis() as u64,
            "Executing query"
        );

        let result = match session.connection_mut() {
            SessionConnection::Postgres(conn) => postgres::run(conn, sql, budget).await,
            SessionConnection::SQLite(conn) => sqlite::run(conn, sql, budget).await,
        };
        let execution_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((columns, rows)) => {
                session.release();
                debug!(
                    row_count = rows.len(),
                    execution_time_ms, "Query succeeded"
                );
                Ok(ExecutionOutcome::Succeeded(QueryResult::new(
                    columns,
                    rows,
                    execution_time_ms,
                )))
            }
            Err(GatewayError::StatementTimeout { .. }) => {
                session.discard();
                let message = GatewayError::statement_timeout(budget).to_string();
                warn!(execution_time_ms, error = %message, "Query timed out");
                Ok(ExecutionOutcome::TimedOut(ExecutionError::new(
                    message,
                    execution_time_ms,
                )))
            }
            Err(GatewayError::Execution { message, sql_state }) => {
                session.release();
                warn!(
                    execution_time_ms,
                    sql_state = ?sql_state,
                    error = %message,
                    "Query rejected by backend"
                );
                Ok(ExecutionOutcome::Failed(ExecutionError::new(
                    message,
                    execution_time_ms,
                )))
            }
            Err(other) => {
                session.discard();
                error!(execution_time_ms, error = %other, "Query execution fault");
                Err(other)
            }
        }
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the client-side budget, reporting server-side cancellations with it too.
async fn bounded<F>(budget: Duration, work: F) -> GatewayResult<(Vec<ColumnDescriptor>, Vec<JsonRow>)>
where
    F: std::future::Future<Output = GatewayResult<(Vec<ColumnDescriptor>, Vec<JsonRow>)>>,
{
    match timeout(budget, work).await {
        Ok(Err(GatewayError::StatementTimeout { .. })) | Err(_) => {
            Err(GatewayError::statement_timeout(budget))
        }
        Ok(result) => result,
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::pool::PoolConnection;
    use sqlx::{Executor, Postgres, Statement};

    pub async fn run(
        conn: &mut PoolConnection<Postgres>,
        sql: &str,
        budget: Duration,
    ) -> GatewayResult<(Vec<ColumnDescriptor>, Vec<JsonRow>)> {
        let set_timeout = format!("SET statement_timeout = {}", budget.as_millis());
        (&mut **conn).execute(set_timeout.as_str()).await?;

        bounded(budget, async {
            let rows = (&mut **conn).fetch_all(sql).await?;
            let columns = match rows.first() {
                Some(row) => row.column_descriptors(),
                None => describe_columns((&mut **conn).prepare(sql).await?.columns()),
            };
            Ok::<_, GatewayError>((columns, rows.iter().map(RowToJson::to_json_map).collect()))
        })
        .await
    }
}

mod sqlite {
    use super::*;
    use sqlx::pool::PoolConnection;
    use sqlx::{Executor, Sqlite, Statement};

    /// VM instructions between deadline checks.
    const PROGRESS_OPS: i32 = 1_000;

    /// SQLite has no server-side statement timeout, so a progress handler
    /// interrupts the statement once the deadline passes. The worker thread is
    /// idle again by the time this returns, even when the client timer fired
    /// first.
    pub async fn run(
        conn: &mut PoolConnection<Sqlite>,
        sql: &str,
        budget: Duration,
    ) -> GatewayResult<(Vec<ColumnDescriptor>, Vec<JsonRow>)> {
        let deadline = Instant::now() + budget;
        conn.lock_handle()
            .await?
            .set_progress_handler(PROGRESS_OPS, move || Instant::now() < deadline);

        let result = bounded(budget, async {
            let rows = (&mut **conn).fetch_all(sql).await?;
            let columns = match rows.first() {
                Some(row) => row.column_descriptors(),
                None => describe_columns((&mut **conn).prepare(sql).await?.columns()),
            };
            Ok::<_, GatewayError>((columns, rows.iter().map(RowToJson::to_json_map).collect()))
        })
        .await;

        // Waits for an interrupted statement to unwind on the worker.
        conn.lock_handle().await?.remove_progress_handler();
        result
    }
}
