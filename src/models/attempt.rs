//! Query attempt telemetry models.

use crate::models::ExecutionOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded execute call.
///
/// Written once after execution and never updated here; only the hint
/// collaborator changes `hints_used`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAttempt {
    pub id: Uuid,
    pub assignment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Sanitized query text
    pub query: String,
    pub is_successful: bool,
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub result_rows: u64,
    pub hints_used: u32,
    pub created_at: DateTime<Utc>,
}

impl QueryAttempt {
    /// Build the attempt record for a classified outcome.
    pub fn from_outcome(
        assignment_id: impl Into<String>,
        user_id: Option<String>,
        query: impl Into<String>,
        outcome: &ExecutionOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            assignment_id: assignment_id.into(),
            user_id,
            query: query.into(),
            is_successful: outcome.is_success(),
            execution_time_ms: outcome.execution_time_ms(),
            error_message: outcome.error_message().map(str::to_string),
            result_rows: outcome.row_count() as u64,
            hints_used: 0,
            created_at: Utc::now(),
        }
    }

    /// Build the attempt record for a call that ended in an unclassified fault.
    pub fn from_fault(
        assignment_id: impl Into<String>,
        user_id: Option<String>,
        query: impl Into<String>,
        message: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            assignment_id: assignment_id.into(),
            user_id,
            query: query.into(),
            is_successful: false,
            execution_time_ms,
            error_message: Some(message.into()),
            result_rows: 0,
            hints_used: 0,
            created_at: Utc::now(),
        }
    }
}

/// Aggregate attempt numbers for one assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStats {
    pub total_attempts: u64,
    pub successful_attempts: u64,
    /// Mean execution time in milliseconds
    pub average_execution_time: f64,
    pub total_hints_used: u64,
}

impl AttemptStats {
    /// Fold a set of attempts into totals.
    pub fn from_attempts<'a>(attempts: impl IntoIterator<Item = &'a QueryAttempt>) -> Self {
        let mut totals = AttemptTotals::default();
        for attempt in attempts {
            totals.add(attempt);
        }
        totals.stats()
    }
}

/// Running counters behind [`AttemptStats`], updated one attempt at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptTotals {
    attempts: u64,
    successful: u64,
    execution_time_ms: u64,
    hints_used: u64,
}

impl AttemptTotals {
    pub fn add(&mut self, attempt: &QueryAttempt) {
        self.attempts += 1;
        if attempt.is_successful {
            self.successful += 1;
        }
        self.execution_time_ms = self.execution_time_ms.saturating_add(attempt.execution_time_ms);
        self.hints_used += attempt.hints_used as u64;
    }

    pub fn stats(&self) -> AttemptStats {
        let average_execution_time = if self.attempts > 0 {
            self.execution_time_ms as f64 / self.attempts as f64
        } else {
            0.0
        };
        AttemptStats {
            total_attempts: self.attempts,
            successful_attempts: self.successful,
            average_execution_time,
            total_hints_used: self.hints_used,
        }
    }
}
