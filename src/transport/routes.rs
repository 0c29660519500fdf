//! HTTP routes.
//!
//! | Method | Path                              |
//! |--------|-----------------------------------|
//! | GET    | `{base}/health`                   |
//! | POST   | `{base}/queries/execute`          |
//! | GET    | `{base}/queries/stats/{id}`       |
//!
//! Anything else answers `404 {success: false, error: "Route not found"}`.

use crate::gateway::{ApiResponse, QueryGateway};
use crate::models::ExecuteRequest;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::info;

type AppState = Arc<QueryGateway>;

/// Build the application router, mounted under `base_path` when it is not empty.
pub fn router(gateway: Arc<QueryGateway>, base_path: &str) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/queries/execute", post(execute))
        .route("/queries/stats/{assignment_id}", get(stats));

    let app = match normalize_base_path(base_path) {
        Some(base) => Router::new().nest(&base, api),
        None => api,
    };

    app.fallback(not_found).with_state(gateway)
}

/// `"api/"` becomes `"/api"`; empty and `"/"` mean no prefix.
pub fn normalize_base_path(base_path: &str) -> Option<String> {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

async fn health() -> Json<JsonValue> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn execute(
    State(gateway): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> ApiResponse {
    match payload {
        Ok(Json(request)) => gateway.execute(&request).await.response,
        Err(rejection) => {
            info!(error = %rejection.body_text(), "Malformed execute request");
            gateway.composer().rejected(rejection.body_text())
        }
    }
}

async fn stats(State(gateway): State<AppState>, Path(assignment_id): Path<String>) -> ApiResponse {
    gateway.stats(&assignment_id).await
}

async fn not_found(State(gateway): State<AppState>) -> ApiResponse {
    gateway.composer().not_found()
}
