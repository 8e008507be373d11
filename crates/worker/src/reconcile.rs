//! Startup repair of jobs orphaned by a crashed process.

use autosuite_db::repositories::JobRepo;
use autosuite_db::DbPool;

use crate::error::WorkerError;

/// Message stored on items cancelled by reconciliation.
pub const ORPHANED_MESSAGE: &str = "worker process lost before completion";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub jobs_failed: usize,
    pub items_cancelled: u64,
}

/// Fail every RUNNING job and cancel its unfinished items.
///
/// Meant to run once at startup, before the first scheduling pass: no
/// worker can be alive at that point, so any RUNNING row is orphaned. Each
/// job is repaired in its own transaction. Errors are returned, never
/// skipped, since scheduling must not resume over a half-repaired store.
pub async fn reconcile_stale_jobs(pool: &DbPool) -> Result<ReconcileReport, WorkerError> {
    let mut report = ReconcileReport::default();

    for job_id in JobRepo::running_ids(pool).await? {
        if let Some(items) = JobRepo::fail_orphaned(pool, &job_id, ORPHANED_MESSAGE).await? {
            tracing::warn!(job_id = %job_id, items_cancelled = items, "Reconciled orphaned job");
            report.jobs_failed += 1;
            report.items_cancelled += items;
        }
    }

    if report.jobs_failed > 0 {
        tracing::info!(
            jobs_failed = report.jobs_failed,
            items_cancelled = report.items_cancelled,
            "Reconciliation complete",
        );
    }
    Ok(report)
}
