//! Query-related data models.
//!
//! This module defines the execute request body and the outcome types the
//! executor produces.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default statement execution budget in milliseconds.
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;

/// Default maximum query length in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 5000;

/// Body of `POST /queries/execute`.
///
/// Fields are kept as raw JSON so that a missing or non-string `query`
/// reaches the validator instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(default)]
    pub query: Option<JsonValue>,
    #[serde(default)]
    pub assignment_id: Option<JsonValue>,
    #[serde(default)]
    pub user_id: Option<JsonValue>,
}

impl ExecuteRequest {
    /// Create a request with a query and assignment id.
    pub fn new(query: impl Into<String>, assignment_id: impl Into<String>) -> Self {
        Self {
            query: Some(JsonValue::String(query.into())),
            assignment_id: Some(JsonValue::String(assignment_id.into())),
            user_id: None,
        }
    }

    /// Set the user id.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(JsonValue::String(user_id.into()));
        self
    }

    /// The query text, if present and textual.
    pub fn query_text(&self) -> Option<&str> {
        self.query.as_ref().and_then(JsonValue::as_str)
    }

    /// The assignment id, if present and not blank.
    pub fn assignment_id(&self) -> Option<&str> {
        self.assignment_id
            .as_ref()
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The user id, if present and not blank.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id
            .as_ref()
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One result column: name plus the engine's opaque type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Engine-specific type name (e.g., "INT4", "TEXT")
    #[serde(rename = "type")]
    pub type_name: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows of a successful query, serialized as the `data` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub row_count: usize,
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(
        columns: Vec<ColumnDescriptor>,
        rows: Vec<serde_json::Map<String, JsonValue>>,
        execution_time_ms: u64,
    ) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms,
        }
    }
}

/// A query the backend refused or did not finish in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    pub message: String,
    pub execution_time_ms: u64,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            message: message.into(),
            execution_time_ms,
        }
    }
}

/// Classified result of running one statement.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Succeeded(QueryResult),
    /// Backend rejected the statement (syntax error, missing object, ...)
    Failed(ExecutionError),
    /// Statement exceeded the execution budget
    TimedOut(ExecutionError),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn execution_time_ms(&self) -> u64 {
        match self {
            Self::Succeeded(result) => result.execution_time_ms,
            Self::Failed(err) | Self::TimedOut(err) => err.execution_time_ms,
        }
    }

    /// Rows returned; zero for failures.
    pub fn row_count(&self) -> usize {
        match self {
            Self::Succeeded(result) => result.row_count,
            _ => 0,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed(err) | Self::TimedOut(err) => Some(&err.message),
        }
    }
}
