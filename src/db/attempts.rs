//! Attempt telemetry stores.
//!
//! [`AttemptStore`] is the seam between the recorder and wherever attempts
//! end up. [`SqlAttemptStore`] writes to a PostgreSQL or SQLite database of
//! its own; [`MemoryAttemptStore`] keeps them in process when no telemetry
//! database is configured.

use crate::db::pool::DbPool;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{AttemptStats, AttemptTotals, ConnectionConfig, QueryAttempt};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Persistence for [`QueryAttempt`] records.
#[async_trait]
pub trait AttemptStore: Send + Sync + Debug {
    /// Write one attempt.
    async fn insert(&self, attempt: &QueryAttempt) -> GatewayResult<()>;

    /// Aggregate all attempts recorded for `assignment_id`.
    async fn stats(&self, assignment_id: &str) -> GatewayResult<AttemptStats>;

    /// Release any connections held by the store.
    async fn close(&self) {}
}

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS query_attempts (
    id TEXT PRIMARY KEY,
    assignment_id TEXT NOT NULL,
    user_id TEXT,
    query TEXT NOT NULL,
    is_successful BOOLEAN NOT NULL,
    execution_time_ms BIGINT NOT NULL,
    error_message TEXT,
    result_rows BIGINT NOT NULL DEFAULT 0,
    hints_used INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
)";

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_query_attempts_assignment ON query_attempts (assignment_id)";

const PG_INSERT: &str = "INSERT INTO query_attempts \
    (id, assignment_id, user_id, query, is_successful, execution_time_ms, error_message, result_rows, hints_used, created_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)";

const SQLITE_INSERT: &str = "INSERT INTO query_attempts \
    (id, assignment_id, user_id, query, is_successful, execution_time_ms, error_message, result_rows, hints_used, created_at) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const STATS_COLUMNS: &str = "SELECT \
    CAST(COUNT(*) AS BIGINT), \
    CAST(COALESCE(SUM(CASE WHEN is_successful THEN 1 ELSE 0 END), 0) AS BIGINT), \
    CAST(COALESCE(AVG(execution_time_ms), 0) AS DOUBLE PRECISION), \
    CAST(COALESCE(SUM(hints_used), 0) AS BIGINT) \
    FROM query_attempts";

type StatsRow = (i64, i64, f64, i64);

/// Attempt store backed by its own writable database.
#[derive(Debug, Clone)]
pub struct SqlAttemptStore {
    pool: DbPool,
}

impl SqlAttemptStore {
    /// Connect to the telemetry database and make sure the table exists.
    ///
    /// The connection is always opened writable, whatever `config` says.
    pub async fn connect(config: &ConnectionConfig) -> GatewayResult<Self> {
        let config = config.clone().writable();
        info!(
            db_type = %config.db_type,
            target = %config.masked_connection_string(),
            "Opening attempt store"
        );
        let pool = DbPool::connect(&config).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> GatewayResult<()> {
        match &self.pool {
            DbPool::Postgres(pool) => {
                sqlx::query(CREATE_TABLE).execute(pool).await.map_err(persistence)?;
                sqlx::query(CREATE_INDEX).execute(pool).await.map_err(persistence)?;
            }
            DbPool::SQLite(pool) => {
                sqlx::query(CREATE_TABLE).execute(pool).await.map_err(persistence)?;
                sqlx::query(CREATE_INDEX).execute(pool).await.map_err(persistence)?;
            }
        }
        debug!("Attempt table ready");
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for SqlAttemptStore {
    async fn insert(&self, attempt: &QueryAttempt) -> GatewayResult<()> {
        let id = attempt.id.to_string();
        let created_at = attempt.created_at.to_rfc3339();
        let execution_time_ms = attempt.execution_time_ms as i64;
        let result_rows = attempt.result_rows as i64;
        let hints_used = attempt.hints_used as i32;

        match &self.pool {
            DbPool::Postgres(pool) => {
                sqlx::query(PG_INSERT)
                    .bind(&id)
                    .bind(&attempt.assignment_id)
                    .bind(&attempt.user_id)
                    .bind(&attempt.query)
                    .bind(attempt.is_successful)
                    .bind(execution_time_ms)
                    .bind(&attempt.error_message)
                    .bind(result_rows)
                    .bind(hints_used)
                    .bind(&created_at)
                    .execute(pool)
                    .await
                    .map_err(persistence)?;
            }
            DbPool::SQLite(pool) => {
                sqlx::query(SQLITE_INSERT)
                    .bind(&id)
                    .bind(&attempt.assignment_id)
                    .bind(&attempt.user_id)
                    .bind(&attempt.query)
                    .bind(attempt.is_successful)
                    .bind(execution_time_ms)
                    .bind(&attempt.error_message)
                    .bind(result_rows)
                    .bind(hints_used)
                    .bind(&created_at)
                    .execute(pool)
                    .await
                    .map_err(persistence)?;
            }
        }
        Ok(())
    }

    async fn stats(&self, assignment_id: &str) -> GatewayResult<AttemptStats> {
        let row: StatsRow = match &self.pool {
            DbPool::Postgres(pool) => {
                sqlx::query_as(&format!("{STATS_COLUMNS} WHERE assignment_id = $1"))
                    .bind(assignment_id)
                    .fetch_one(pool)
                    .await
                    .map_err(persistence)?
            }
            DbPool::SQLite(pool) => {
                sqlx::query_as(&format!("{STATS_COLUMNS} WHERE assignment_id = ?"))
                    .bind(assignment_id)
                    .fetch_one(pool)
                    .await
                    .map_err(persistence)?
            }
        };

        let (total, successful, average, hints) = row;
        Ok(AttemptStats {
            total_attempts: total.max(0) as u64,
            successful_attempts: successful.max(0) as u64,
            average_execution_time: average,
            total_hints_used: hints.max(0) as u64,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Attempt store closed");
    }
}

fn persistence(err: sqlx::Error) -> GatewayError {
    GatewayError::persistence(err.to_string())
}

/// Attempts kept for [`MemoryAttemptStore::attempts`] by default.
pub const DEFAULT_RECENT_ATTEMPTS: usize = 1_000;

/// In-process attempt store.
///
/// Stats are folded into per-assignment counters as attempts arrive. Only the
/// most recent `capacity` attempts are kept as full records.
#[derive(Debug)]
pub struct MemoryAttemptStore {
    state: RwLock<MemoryState>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    totals: HashMap<String, AttemptTotals>,
    recent: VecDeque<QueryAttempt>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RECENT_ATTEMPTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            capacity,
        }
    }

    /// Snapshot of the retained attempts, oldest first.
    pub async fn attempts(&self) -> Vec<QueryAttempt> {
        self.state.read().await.recent.iter().cloned().collect()
    }
}

impl Default for MemoryAttemptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn insert(&self, attempt: &QueryAttempt) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        state
            .totals
            .entry(attempt.assignment_id.clone())
            .or_default()
            .add(attempt);

        if self.capacity > 0 {
            if state.recent.len() == self.capacity {
                state.recent.pop_front();
            }
            state.recent.push_back(attempt.clone());
        }
        Ok(())
    }

    async fn stats(&self, assignment_id: &str) -> GatewayResult<AttemptStats> {
        let state = self.state.read().await;
        Ok(state
            .totals
            .get(assignment_id)
            .map(AttemptTotals::stats)
            .unwrap_or_default())
    }
}
