//! Assignment catalog lookup.
//!
//! Assignments are managed elsewhere. The gateway only resolves an id to
//! label its telemetry, so a missing assignment is never a reason to refuse
//! a query.

use crate::error::{GatewayError, GatewayResult};
use crate::models::Assignment;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use tracing::info;

const BUILTIN_ASSIGNMENTS: &str = include_str!("../data/assignments.json");

/// Read access to the assignment catalog.
#[async_trait]
pub trait AssignmentCatalog: Send + Sync + Debug {
    /// Look up one assignment, failing with [`GatewayError::NotFound`].
    async fn get_by_id(&self, id: &str) -> GatewayResult<Assignment>;
}

/// Catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    assignments: HashMap<String, Assignment>,
}

impl InMemoryCatalog {
    pub fn new(assignments: impl IntoIterator<Item = Assignment>) -> Self {
        Self {
            assignments: assignments
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect(),
        }
    }

    /// The sample assignments shipped with the gateway.
    pub fn builtin() -> GatewayResult<Self> {
        Self::from_json(BUILTIN_ASSIGNMENTS)
    }

    /// Parse a JSON array of assignments.
    pub fn from_json(json: &str) -> GatewayResult<Self> {
        let assignments: Vec<Assignment> = serde_json::from_str(json).map_err(|e| {
            GatewayError::configuration(format!("Invalid assignment catalog: {}", e))
        })?;
        Ok(Self::new(assignments))
    }

    /// Load a catalog file.
    pub fn from_file(path: &Path) -> GatewayResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::configuration(format!(
                "Failed to read assignment catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        let catalog = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            count = catalog.len(),
            "Loaded assignment catalog"
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[async_trait]
impl AssignmentCatalog for InMemoryCatalog {
    async fn get_by_id(&self, id: &str) -> GatewayResult<Assignment> {
        self.assignments
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("Assignment", id))
    }
}
