//! Mapping from pipeline outcomes to the HTTP response contract.
//!
//! Every body carries a `success` flag. Client-caused failures are `400` with
//! the diagnostic in `error`; server faults are `500` with a fixed message and,
//! in development mode only, the fault text in `details`.

use crate::error::GatewayError;
use crate::models::{AttemptStats, ExecutionOutcome};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value as JsonValue, json};

pub const EXECUTE_FAULT_MESSAGE: &str = "Failed to execute query";
pub const STATS_FAULT_MESSAGE: &str = "Failed to fetch query statistics";
pub const ROUTE_NOT_FOUND_MESSAGE: &str = "Route not found";

/// Status plus JSON body, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: JsonValue,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: JsonValue) -> Self {
        Self { status, body }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseComposer {
    expose_details: bool,
}

impl ResponseComposer {
    /// `expose_details` adds fault text to 500 bodies.
    pub fn new(expose_details: bool) -> Self {
        Self { expose_details }
    }

    /// 400 for a request refused before execution.
    pub fn rejected(&self, message: impl Into<String>) -> ApiResponse {
        ApiResponse::new(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "error": message.into() }),
        )
    }

    pub fn outcome(&self, outcome: &ExecutionOutcome) -> ApiResponse {
        match outcome {
            ExecutionOutcome::Succeeded(result) => {
                ApiResponse::new(StatusCode::OK, json!({ "success": true, "data": result }))
            }
            ExecutionOutcome::Failed(err) | ExecutionOutcome::TimedOut(err) => ApiResponse::new(
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "error": err.message,
                    "executionTime": err.execution_time_ms,
                }),
            ),
        }
    }

    /// 500 for an execute call that failed outside the classified outcomes.
    pub fn execute_fault(&self, err: &GatewayError) -> ApiResponse {
        self.fault(EXECUTE_FAULT_MESSAGE, err)
    }

    pub fn stats(&self, stats: &AttemptStats) -> ApiResponse {
        ApiResponse::new(StatusCode::OK, json!({ "success": true, "data": stats }))
    }

    pub fn stats_fault(&self, err: &GatewayError) -> ApiResponse {
        self.fault(STATS_FAULT_MESSAGE, err)
    }

    pub fn not_found(&self) -> ApiResponse {
        ApiResponse::new(
            StatusCode::NOT_FOUND,
            json!({ "success": false, "error": ROUTE_NOT_FOUND_MESSAGE }),
        )
    }

    fn fault(&self, message: &str, err: &GatewayError) -> ApiResponse {
        let mut body = json!({ "success": false, "error": message });
        if self.expose_details {
            body["details"] = JsonValue::String(err.to_string());
        }
        ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDescriptor, ExecutionError, QueryResult};

    #[test]
    fn test_success_payload_shape() {
        let mut row = serde_json::Map::new();
        row.insert("id".into(), json!(1));
        let outcome = ExecutionOutcome::Succeeded(QueryResult::new(
            vec![ColumnDescriptor::new("id", "INTEGER")],
            vec![row],
            7,
        ));

        let response = ResponseComposer::default().outcome(&outcome);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.body,
            json!({
                "success": true,
                "data": {
                    "columns": [{"name": "id", "type": "INTEGER"}],
                    "rows": [{"id": 1}],
                    "rowCount": 1,
                    "executionTime": 7
                }
            })
        );
    }

    #[test]
    fn test_execution_errors_are_client_errors() {
        let composer = ResponseComposer::default();
        for outcome in [
            ExecutionOutcome::Failed(ExecutionError::new("no such table: missing", 3)),
            ExecutionOutcome::TimedOut(ExecutionError::new("statement timeout", 30_000)),
        ] {
            let response = composer.outcome(&outcome);
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            assert_eq!(response.body["success"], false);
            assert_eq!(response.body["executionTime"], outcome.execution_time_ms());
        }
    }

    #[test]
    fn test_rejection_has_no_execution_time() {
        let response = ResponseComposer::default().rejected("Query cannot be empty");
        assert_eq!(
            response.body,
            json!({"success": false, "error": "Query cannot be empty"})
        );
    }

    #[test]
    fn test_fault_details_only_in_dev_mode() {
        let err = GatewayError::internal("socket closed");

        let prod = ResponseComposer::new(false).execute_fault(&err);
        assert_eq!(prod.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            prod.body,
            json!({"success": false, "error": "Failed to execute query"})
        );

        let dev = ResponseComposer::new(true).stats_fault(&err);
        assert_eq!(dev.body["error"], "Failed to fetch query statistics");
        assert_eq!(dev.body["details"], "Internal error: socket closed");
    }
}
