//! Job item entity model.

use autosuite_core::error::CoreError;
use autosuite_core::status::ItemStatus;
use autosuite_core::types::{JsonMap, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `job_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobItem {
    pub id: String,
    pub job_id: String,
    pub idx: i64,
    pub status: String,
    pub retry_count: i64,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub timings: Option<serde_json::Value>,
    pub extras: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl JobItem {
    pub fn item_status(&self) -> Result<ItemStatus, CoreError> {
        self.status.parse()
    }

    /// The raw input payload handed to the runner.
    pub fn input_map(&self) -> JsonMap {
        match &self.input {
            serde_json::Value::Object(map) => map.clone(),
            _ => JsonMap::new(),
        }
    }
}
