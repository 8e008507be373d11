//! Job cancellation.
//!
//! Terminates the job's worker by pid, which assumes the worker runs on the
//! same host as the caller.

use autosuite_core::error::CoreError;
use autosuite_db::models::job::Job;
use autosuite_db::repositories::JobRepo;
use autosuite_db::DbPool;

use crate::error::WorkerError;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// The job moved to CANCELLED.
    Cancelled { job: Job, items_cancelled: u64 },
    /// The job was already terminal and was left as is.
    Unchanged(Job),
}

impl CancelOutcome {
    pub fn job(&self) -> &Job {
        match self {
            Self::Cancelled { job, .. } | Self::Unchanged(job) => job,
        }
    }
}

/// Cancel a PENDING or RUNNING job.
///
/// Sends SIGTERM to the recorded worker (a process that is already gone is
/// ignored), cancels unfinished items, then lets the scheduler refill the
/// slot.
pub async fn cancel_job(
    pool: &DbPool,
    scheduler: &Scheduler,
    job_id: &str,
) -> Result<CancelOutcome, WorkerError> {
    let job = find_job(pool, job_id).await?;
    if job.job_status()?.is_terminal() {
        return Ok(CancelOutcome::Unchanged(job));
    }

    if let Some(pid) = job.worker_pid {
        terminate(pid);
    }

    let Some(items_cancelled) = JobRepo::cancel(pool, job_id).await? else {
        // Finished between the read and the update.
        return Ok(CancelOutcome::Unchanged(find_job(pool, job_id).await?));
    };
    tracing::info!(job_id = %job_id, items_cancelled, "Job cancelled");

    if let Err(e) = scheduler.schedule_jobs().await {
        tracing::error!(job_id = %job_id, error = %e, "Scheduling after cancel failed");
    }

    Ok(CancelOutcome::Cancelled {
        job: find_job(pool, job_id).await?,
        items_cancelled,
    })
}

async fn find_job(pool: &DbPool, job_id: &str) -> Result<Job, WorkerError> {
    JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "job",
                id: job_id.to_string(),
            }
            .into()
        })
}

/// Send SIGTERM to a worker pid. Returns whether a signal was delivered.
#[cfg(unix)]
fn terminate(pid: i64) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        tracing::warn!(pid, "Worker pid out of range, not signalling");
        return false;
    };
    if pid <= 0 {
        tracing::warn!(pid, "Refusing to signal a non-positive pid");
        return false;
    }

    // SAFETY: kill(2) takes plain integers and touches no memory we own.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        tracing::info!(pid, "Sent SIGTERM to worker");
        return true;
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        tracing::debug!(pid, "Worker already exited");
    } else {
        tracing::warn!(pid, error = %err, "Failed to signal worker");
    }
    false
}

#[cfg(not(unix))]
fn terminate(pid: i64) -> bool {
    tracing::warn!(pid, "Worker termination is only supported on unix");
    false
}
