//! Query safety gateway.
//!
//! [`QueryGateway`] drives one execute request through the pipeline:
//!
//! ```text
//! validate -> sanitize -> execute -> record (background) -> respond
//! ```
//!
//! Rejected queries never reach the backend and are not recorded. Every query
//! that reaches the executor produces exactly one attempt record, whatever
//! the outcome.

pub mod recorder;
pub mod response;
pub mod sanitizer;
pub mod validator;

pub use recorder::AttemptRecorder;
pub use response::{ApiResponse, ResponseComposer};
pub use sanitizer::sanitize;
pub use validator::{
    DEFAULT_DISALLOWED_KEYWORDS, Heuristic, PolicyViolation, QueryPolicy, QueryValidator,
    ValidationOutcome,
};

use crate::assignments::{AssignmentCatalog, InMemoryCatalog};
use crate::db::{QueryExecutor, SessionPool};
use crate::error::GatewayError;
use crate::models::{ExecuteRequest, QueryAttempt};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const ASSIGNMENT_REQUIRED_MESSAGE: &str = "Valid assignment ID is required";

/// Response to an execute call plus the pending attempt write, if any.
#[derive(Debug)]
pub struct GatewayReply {
    pub response: ApiResponse,
    pub recording: Option<JoinHandle<()>>,
}

/// Request pipeline shared by all HTTP handlers.
#[derive(Debug, Clone)]
pub struct QueryGateway {
    validator: QueryValidator,
    pool: SessionPool,
    executor: QueryExecutor,
    recorder: AttemptRecorder,
    catalog: Arc<dyn AssignmentCatalog>,
    composer: ResponseComposer,
}

impl QueryGateway {
    /// Create a gateway with the default policy, a 30 s budget and no catalog.
    pub fn new(pool: SessionPool, recorder: AttemptRecorder) -> Self {
        Self {
            validator: QueryValidator::default(),
            pool,
            executor: QueryExecutor::new(),
            recorder,
            catalog: Arc::new(InMemoryCatalog::default()),
            composer: ResponseComposer::default(),
        }
    }

    pub fn with_validator(mut self, validator: QueryValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_executor(mut self, executor: QueryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn AssignmentCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_composer(mut self, composer: ResponseComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    pub fn composer(&self) -> &ResponseComposer {
        &self.composer
    }

    /// Run one execute request to completion.
    pub async fn execute(&self, request: &ExecuteRequest) -> GatewayReply {
        if let ValidationOutcome::Rejected(violation) =
            self.validator.validate(request.query_text())
        {
            info!(
                assignment_id = request.assignment_id().unwrap_or_default(),
                heuristic = violation.heuristic(),
                reason = %violation,
                "Query rejected by policy"
            );
            return GatewayReply {
                response: self.composer.rejected(violation.to_string()),
                recording: None,
            };
        }

        let Some(assignment_id) = request.assignment_id() else {
            info!("Query rejected: missing assignment id");
            return GatewayReply {
                response: self.composer.rejected(ASSIGNMENT_REQUIRED_MESSAGE),
                recording: None,
            };
        };
        let user_id = request.user_id().map(str::to_string);
        let query = sanitize(request.query_text().unwrap_or_default());
        let assignment = self.assignment_title(assignment_id).await;

        let start = Instant::now();
        let (response, attempt) = match self.executor.execute(&self.pool, &query).await {
            Ok(outcome) => {
                info!(
                    assignment_id,
                    assignment = assignment.as_deref(),
                    success = outcome.is_success(),
                    row_count = outcome.row_count(),
                    execution_time_ms = outcome.execution_time_ms(),
                    "Query executed"
                );
                let attempt = QueryAttempt::from_outcome(assignment_id, user_id, &query, &outcome);
                (self.composer.outcome(&outcome), attempt)
            }
            Err(err) => {
                let execution_time_ms = start.elapsed().as_millis() as u64;
                error!(
                    assignment_id,
                    execution_time_ms,
                    error = %err,
                    "Query execution failed"
                );
                let attempt = QueryAttempt::from_fault(
                    assignment_id,
                    user_id,
                    &query,
                    err.to_string(),
                    execution_time_ms,
                );
                (self.composer.execute_fault(&err), attempt)
            }
        };

        GatewayReply {
            response,
            recording: Some(self.recorder.record(attempt)),
        }
    }

    /// Aggregate attempt numbers for one assignment.
    pub async fn stats(&self, assignment_id: &str) -> ApiResponse {
        match self.recorder.store().stats(assignment_id).await {
            Ok(stats) => {
                debug!(assignment_id, total = stats.total_attempts, "Fetched attempt stats");
                self.composer.stats(&stats)
            }
            Err(err) => {
                error!(assignment_id, error = %err, "Failed to fetch attempt stats");
                self.composer.stats_fault(&err)
            }
        }
    }

    /// Close the backend pool and the attempt store. Pending acquires fail.
    pub async fn close(&self) {
        self.pool.close().await;
        self.recorder.store().close().await;
    }

    async fn assignment_title(&self, assignment_id: &str) -> Option<String> {
        match self.catalog.get_by_id(assignment_id).await {
            Ok(assignment) => Some(assignment.title),
            Err(GatewayError::NotFound { .. }) => {
                debug!(assignment_id, "Assignment not in catalog");
                None
            }
            Err(err) => {
                warn!(assignment_id, error = %err, "Assignment lookup failed");
                None
            }
        }
    }
}
