//! Job entity model and DTOs.

use autosuite_core::error::CoreError;
use autosuite_core::flow::FlowType;
use autosuite_core::status::JobStatus;
use autosuite_core::types::{JsonMap, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: String,
    pub flow_type: String,
    pub status: String,
    pub options: serde_json::Value,
    pub count_done: i64,
    pub count_failed: i64,
    pub count_cancelled: i64,
    pub worker_pid: Option<i64>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl Job {
    pub fn job_status(&self) -> Result<JobStatus, CoreError> {
        self.status.parse()
    }

    pub fn flow(&self) -> Result<FlowType, CoreError> {
        self.flow_type.parse()
    }

    /// Job options as an object; anything else counts as empty.
    pub fn options_map(&self) -> JsonMap {
        match &self.options {
            serde_json::Value::Object(map) => map.clone(),
            _ => JsonMap::new(),
        }
    }
}

/// Everything needed to insert a job and its items in one transaction.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub flow_type: FlowType,
    pub options: JsonMap,
    /// Item inputs in submission order; the position becomes `idx`.
    pub items: Vec<JsonMap>,
}

/// Filters for listing jobs, newest first.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub flow_type: Option<FlowType>,
    pub limit: i64,
    pub offset: i64,
}

/// Item counts written when a job reaches a terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub done: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl From<&Job> for JobCounts {
    fn from(job: &Job) -> Self {
        Self {
            done: job.count_done,
            failed: job.count_failed,
            cancelled: job.count_cancelled,
        }
    }
}
