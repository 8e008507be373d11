//! FIFO admission of PENDING jobs into a bounded pool of RUNNING slots.
//!
//! [`Scheduler::schedule_jobs`] may be called from any number of tasks or
//! processes at once. The only mutual exclusion is the guarded
//! PENDING -> RUNNING update in [`JobRepo::try_claim`]; a lost race simply
//! moves on to the next slot.

use std::sync::Arc;

use autosuite_core::status::JobStatus;
use autosuite_db::repositories::JobRepo;
use autosuite_db::DbPool;

use crate::error::WorkerError;
use crate::launcher::WorkerLauncher;
use crate::metrics;

/// Jobs claimed and launched by one `schedule_jobs` call, in claim order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub claimed: Vec<String>,
}

impl ScheduleReport {
    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

#[derive(Clone)]
pub struct Scheduler {
    pool: DbPool,
    launcher: Arc<dyn WorkerLauncher>,
    max_workers: u32,
}

impl Scheduler {
    pub fn new(pool: DbPool, launcher: Arc<dyn WorkerLauncher>, max_workers: u32) -> Self {
        Self {
            pool,
            launcher,
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> u32 {
        self.max_workers
    }

    /// Fill free RUNNING slots with the oldest unclaimed PENDING jobs.
    ///
    /// Each claimed job gets a worker process and its pid recorded. Passes
    /// repeat while they keep claiming and stop after the first pass that
    /// claims nothing. A launch failure hands the job back to PENDING and is
    /// returned; jobs claimed earlier in the same call keep their workers.
    pub async fn schedule_jobs(&self) -> Result<ScheduleReport, WorkerError> {
        let mut report = ScheduleReport::default();

        loop {
            let running = JobRepo::count_by_status(&self.pool, JobStatus::Running).await?;
            let slots = i64::from(self.max_workers) - running;
            if slots <= 0 {
                tracing::debug!(running, max_workers = self.max_workers, "No free worker slots");
                break;
            }

            let mut claimed_this_pass = 0usize;
            for _ in 0..slots {
                let Some(job_id) = JobRepo::oldest_pending_id(&self.pool).await? else {
                    break;
                };

                if !JobRepo::try_claim(&self.pool, &job_id).await? {
                    tracing::debug!(job_id = %job_id, "Claim lost to another scheduler");
                    continue;
                }

                self.start_worker(&job_id).await?;
                metrics::record_job_claimed();
                report.claimed.push(job_id);
                claimed_this_pass += 1;
            }

            if claimed_this_pass == 0 {
                break;
            }
        }

        if !report.is_empty() {
            tracing::info!(claimed = ?report.claimed, "Scheduled jobs");
        }
        Ok(report)
    }

    /// Launch the worker for a job this scheduler just claimed.
    async fn start_worker(&self, job_id: &str) -> Result<(), WorkerError> {
        let pid = match self.launcher.launch(job_id).await {
            Ok(pid) => pid,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Worker launch failed, releasing claim");
                if !JobRepo::release_claim(&self.pool, job_id).await? {
                    tracing::warn!(job_id = %job_id, "Claim changed before it could be released");
                }
                return Err(e.into());
            }
        };

        if JobRepo::set_worker_pid(&self.pool, job_id, pid).await? {
            tracing::info!(job_id = %job_id, pid, "Job claimed");
        } else {
            // The worker already finished (or the job was cancelled).
            tracing::debug!(job_id = %job_id, pid, "Job left RUNNING before pid was recorded");
        }
        Ok(())
    }
}
