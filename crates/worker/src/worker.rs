//! The worker process of record for one job.

use autosuite_core::result::JobSummary;
use autosuite_core::status::JobStatus;
use autosuite_core::types::JsonMap;
use autosuite_db::models::job::Job;
use autosuite_db::repositories::{JobItemRepo, JobRepo};
use autosuite_db::DbPool;
use autosuite_engine::FlowRunner;
use serde_json::Value;

use crate::error::WorkerError;
use crate::scheduler::Scheduler;

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// No job with the requested id exists.
    Missing,
    /// The job was already terminal when the worker started.
    Skipped { status: JobStatus },
    /// Every item ran and the results were persisted.
    Finished {
        status: JobStatus,
        summary: JobSummary,
    },
    /// The job left RUNNING while its items ran; results were discarded.
    Superseded { summary: JobSummary },
    /// The run could not complete and the job was marked FAILED.
    Failed { error: String },
}

/// Run one job to completion and write its results back.
///
/// Any error while loading items, running the flow or persisting results
/// marks the job FAILED. Except for a missing job, the scheduler is always
/// invoked afterwards so the freed slot gets refilled.
pub async fn execute_job(
    pool: &DbPool,
    runner: &FlowRunner,
    scheduler: &Scheduler,
    job_id: &str,
) -> Result<JobOutcome, WorkerError> {
    let Some(job) = JobRepo::find_by_id(pool, job_id).await? else {
        tracing::warn!(job_id = %job_id, "Job not found, nothing to run");
        return Ok(JobOutcome::Missing);
    };

    let outcome = match run_and_persist(pool, runner, &job).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Job run failed");
            JobRepo::fail(pool, job_id)
                .await
                .map(|_| JobOutcome::Failed {
                    error: e.to_string(),
                })
                .map_err(WorkerError::from)
        }
    };

    fill_free_slot(scheduler, job_id).await;
    outcome
}

async fn run_and_persist(
    pool: &DbPool,
    runner: &FlowRunner,
    job: &Job,
) -> Result<JobOutcome, WorkerError> {
    if !JobRepo::mark_running(pool, &job.id).await? {
        let status = job.job_status()?;
        tracing::info!(job_id = %job.id, status = %status, "Job already finished, skipping");
        return Ok(JobOutcome::Skipped { status });
    }

    let flow = job.flow()?;
    let items: Vec<JsonMap> = JobItemRepo::list_by_job(pool, &job.id)
        .await?
        .iter()
        .map(|item| item.input_map())
        .collect();

    let mut options = job.options_map();
    options.insert("job_id".to_string(), Value::String(job.id.clone()));

    let results = runner.run_job(flow, &items, &options).await?;
    let summary = JobSummary::from_results(&results);
    let status = summary.job_status();

    if JobRepo::complete(pool, &job.id, &results, status, &summary).await? {
        Ok(JobOutcome::Finished { status, summary })
    } else {
        tracing::warn!(job_id = %job.id, "Job left RUNNING during the run, results discarded");
        Ok(JobOutcome::Superseded { summary })
    }
}

async fn fill_free_slot(scheduler: &Scheduler, job_id: &str) {
    if let Err(e) = scheduler.schedule_jobs().await {
        tracing::error!(job_id = %job_id, error = %e, "Scheduling after job run failed");
    }
}
