//! Assignment catalog models.
//!
//! Assignments are owned by an external content service; the gateway only
//! reads them to put attempt telemetry in context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleTable {
    pub table_name: String,
    /// Column name to declared SQL type
    pub schema: BTreeMap<String, String>,
    #[serde(default)]
    pub sample_data: Vec<serde_json::Map<String, JsonValue>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hint {
    pub level: u32,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub question: String,
    pub difficulty: Difficulty,
    pub expected_output: String,
    #[serde(default)]
    pub sample_tables: Vec<SampleTable>,
    #[serde(default)]
    pub hints: Vec<Hint>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}
