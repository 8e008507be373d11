//! Per-action and per-item outcome records, plus the job status rollup.

use serde::Serialize;

use crate::error_code::{ErrorCode, FlowError};
use crate::status::{ItemStatus, JobStatus};
use crate::types::{JsonMap, Timings};

/// What a flow's `run_item` returns: a success value XOR a coded failure,
/// with timings and extras attached either way.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub outcome: Result<JsonMap, FlowError>,
    pub timings: Timings,
    pub extras: JsonMap,
}

impl ActionResult {
    pub fn ok(value: JsonMap) -> Self {
        Self {
            outcome: Ok(value),
            timings: Timings::new(),
            extras: JsonMap::new(),
        }
    }

    pub fn fail(error: FlowError) -> Self {
        Self {
            outcome: Err(error),
            timings: Timings::new(),
            extras: JsonMap::new(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_extras(mut self, extras: JsonMap) -> Self {
        self.extras = extras;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Flattened outcome for one job item, produced once by the runner and
/// translated into `job_items` columns by the worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    pub status: ItemStatus,
    pub retry_count: u32,
    pub error_code: ErrorCode,
    pub error_message: Option<String>,
    pub output: JsonMap,
    pub extras: JsonMap,
    pub timings: Timings,
}

impl ItemResult {
    pub fn done(output: JsonMap, retry_count: u32, timings: Timings, extras: JsonMap) -> Self {
        Self {
            status: ItemStatus::Done,
            retry_count,
            error_code: ErrorCode::None,
            error_message: None,
            output,
            extras,
            timings,
        }
    }

    pub fn failed(error: &FlowError, retry_count: u32) -> Self {
        Self {
            status: ItemStatus::Failed,
            retry_count,
            error_code: error.code,
            error_message: Some(error.message.clone()),
            output: JsonMap::new(),
            extras: JsonMap::new(),
            timings: Timings::new(),
        }
    }

    /// A duplicate of an earlier item in the same batch.
    pub fn deduped() -> Self {
        Self {
            status: ItemStatus::Cancelled,
            retry_count: 0,
            error_code: ErrorCode::Deduped,
            error_message: Some(ErrorCode::Deduped.as_str().to_string()),
            output: JsonMap::new(),
            extras: JsonMap::new(),
            timings: Timings::new(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_extras(mut self, extras: JsonMap) -> Self {
        self.extras = extras;
        self
    }
}

/// Item counts for one job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl JobSummary {
    pub fn from_results(results: &[ItemResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.status {
                ItemStatus::Done => summary.done += 1,
                ItemStatus::Failed => summary.failed += 1,
                ItemStatus::Cancelled => summary.cancelled += 1,
                _ => {}
            }
        }
        summary
    }

    /// Job-level terminal status derived from item counts.
    ///
    /// CANCELLED when something was cancelled and not every item finished as
    /// done/failed; otherwise FAILED when anything failed; otherwise DONE.
    pub fn job_status(&self) -> JobStatus {
        if self.cancelled > 0 && self.done + self.failed < self.total {
            JobStatus::Cancelled
        } else if self.failed > 0 {
            JobStatus::Failed
        } else {
            JobStatus::Done
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total: usize, done: usize, failed: usize, cancelled: usize) -> JobSummary {
        JobSummary {
            total,
            done,
            failed,
            cancelled,
        }
    }

    #[test]
    fn all_done_is_done() {
        assert_eq!(summary(3, 3, 0, 0).job_status(), JobStatus::Done);
    }

    #[test]
    fn any_failure_is_failed() {
        assert_eq!(summary(3, 2, 1, 0).job_status(), JobStatus::Failed);
    }

    #[test]
    fn cancelled_item_wins_over_failure() {
        assert_eq!(summary(3, 1, 1, 1).job_status(), JobStatus::Cancelled);
    }

    #[test]
    fn empty_job_is_done() {
        assert_eq!(summary(0, 0, 0, 0).job_status(), JobStatus::Done);
    }

    #[test]
    fn counts_are_taken_from_statuses() {
        let ok = ItemResult::done(JsonMap::new(), 0, Timings::new(), JsonMap::new());
        let bad = ItemResult::failed(&FlowError::navigation("dns"), 2);
        let dup = ItemResult::deduped();
        let counted = JobSummary::from_results(&[ok, bad, dup]);
        assert_eq!(counted, summary(3, 1, 1, 1));
    }

    #[test]
    fn deduped_result_shape() {
        let dup = ItemResult::deduped();
        assert_eq!(dup.status, ItemStatus::Cancelled);
        assert_eq!(dup.error_code, ErrorCode::Deduped);
        assert_eq!(dup.error_message.as_deref(), Some("DEDUPED"));
    }

    #[test]
    fn failed_result_keeps_code_and_message() {
        let res = ItemResult::failed(&FlowError::invalid_input("invalid_url"), 0);
        assert_eq!(res.error_code, ErrorCode::InvalidInput);
        assert_eq!(res.error_message.as_deref(), Some("invalid_url"));
        assert!(res.output.is_empty());
    }
}
