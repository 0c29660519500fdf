//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use sql_studio_gateway::config::PoolOptions;
use sql_studio_gateway::db::{AttemptStore, MemoryAttemptStore, SessionPool};
use sql_studio_gateway::error::{GatewayError, GatewayResult};
use sql_studio_gateway::gateway::{AttemptRecorder, QueryGateway};
use sql_studio_gateway::models::{AttemptStats, ConnectionConfig, QueryAttempt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

pub const ASSIGNMENT_ID: &str = "64f8a1b2c3d4e5f6a7b8c9d0";

/// A practice database in a temp directory, removed on drop.
pub struct PracticeDb {
    _dir: TempDir,
    pub url: String,
}

/// Create and seed the employees/departments practice database.
pub async fn practice_db() -> PracticeDb {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("practice.db").display());

    // Rollback journal so later read-only opens need no -wal/-shm files.
    let options = SqliteConnectOptions::from_str(&url)
        .unwrap()
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let seed = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    for statement in [
        "CREATE TABLE employees (id INTEGER PRIMARY KEY, name VARCHAR(100), department VARCHAR(50), salary INTEGER, hire_date DATE)",
        "INSERT INTO employees VALUES (1, 'John Doe', 'Engineering', 75000, '2022-01-15')",
        "INSERT INTO employees VALUES (2, 'Jane Smith', 'Marketing', 45000, '2022-03-20')",
        "INSERT INTO employees VALUES (3, 'Bob Johnson', 'Engineering', 80000, '2021-11-10')",
        "INSERT INTO employees VALUES (4, 'Alice Brown', 'HR', 55000, '2023-02-01')",
        "CREATE TABLE departments (id INTEGER PRIMARY KEY, name VARCHAR(100))",
        "INSERT INTO departments VALUES (1, 'Engineering'), (2, 'Marketing'), (3, 'HR')",
    ] {
        sqlx::query(statement).execute(&seed).await.unwrap();
    }
    seed.close().await;

    PracticeDb { _dir: dir, url }
}

/// Read-only session pool over `db`.
pub async fn session_pool(db: &PracticeDb, size: u32) -> SessionPool {
    let config = ConnectionConfig::new(&db.url, PoolOptions::with_size(size)).unwrap();
    SessionPool::connect(&config).await.unwrap()
}

pub async fn gateway_with_store(
    db: &PracticeDb,
    size: u32,
    store: Arc<dyn AttemptStore>,
) -> QueryGateway {
    QueryGateway::new(session_pool(db, size).await, AttemptRecorder::new(store))
}

pub async fn gateway(db: &PracticeDb) -> (QueryGateway, Arc<MemoryAttemptStore>) {
    let store = Arc::new(MemoryAttemptStore::new());
    let gateway = gateway_with_store(db, 2, store.clone()).await;
    (gateway, store)
}

/// Store whose every call fails.
#[derive(Debug)]
pub struct FailingStore;

#[async_trait::async_trait]
impl AttemptStore for FailingStore {
    async fn insert(&self, _attempt: &QueryAttempt) -> GatewayResult<()> {
        Err(GatewayError::persistence("connection reset by peer"))
    }

    async fn stats(&self, _assignment_id: &str) -> GatewayResult<AttemptStats> {
        Err(GatewayError::persistence("connection reset by peer"))
    }
}

/// A single-row query that keeps SQLite busy for well over a second.
pub const SLOW_QUERY: &str = "SELECT count(*) FROM (WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 20000000) SELECT x FROM c)";

/// An unbounded recursive query that only stops when interrupted.
pub const RUNAWAY_QUERY: &str = "SELECT count(*) FROM (WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT x FROM c)";
