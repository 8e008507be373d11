//! Repository for the `jobs` table.
//!
//! Every status transition is a conditional UPDATE guarded on the status the
//! caller expects to leave. A zero-row result means another process got
//! there first, which callers treat as a normal outcome rather than an error.

use autosuite_core::result::{ItemResult, JobSummary};
use autosuite_core::status::{ItemStatus, JobStatus};
use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::models::job::{Job, JobFilter, NewJob};
use crate::repositories::JobItemRepo;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, flow_type, status, options, count_done, count_failed, count_cancelled, \
    worker_pid, created_at, finished_at";

/// Recompute the stored counts from the job's item rows.
const COUNTS_FROM_ITEMS: &str = "\
    count_done = (SELECT COUNT(*) FROM job_items WHERE job_id = jobs.id AND status = 'DONE'), \
    count_failed = (SELECT COUNT(*) FROM job_items WHERE job_id = jobs.id AND status = 'FAILED'), \
    count_cancelled = (SELECT COUNT(*) FROM job_items WHERE job_id = jobs.id AND status = 'CANCELLED')";

/// Result of an insert that may collide with an existing job id.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Job),
    /// A job with the same id already existed and was left untouched.
    Existing(Job),
}

/// Provides job persistence and the guarded lifecycle transitions.
pub struct JobRepo;

impl JobRepo {
    // -----------------------------------------------------------------------
    // Creation and reads
    // -----------------------------------------------------------------------

    /// Insert a PENDING job and its PENDING items in one transaction.
    pub async fn create(pool: &SqlitePool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO jobs (id, flow_type, status, options, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(&input.id)
            .bind(input.flow_type.as_str())
            .bind(JobStatus::Pending.as_str())
            .bind(Json(&input.options))
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        for (idx, item) in input.items.iter().enumerate() {
            JobItemRepo::insert(&mut tx, &job.id, idx, item, now).await?;
        }

        tx.commit().await?;
        Ok(job)
    }

    /// Insert a job, treating a primary-key collision as "already created".
    ///
    /// Used for idempotent submissions whose id is derived from a client key.
    pub async fn create_or_existing(
        pool: &SqlitePool,
        input: &NewJob,
    ) -> Result<CreateOutcome, sqlx::Error> {
        match Self::create(pool, input).await {
            Ok(job) => Ok(CreateOutcome::Created(job)),
            Err(err) if crate::is_unique_violation(&err) => {
                match Self::find_by_id(pool, &input.id).await? {
                    Some(existing) => Ok(CreateOutcome::Existing(existing)),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs newest first with optional status / flow filters.
    pub async fn list(pool: &SqlitePool, filter: &JobFilter) -> Result<Vec<Job>, sqlx::Error> {
        let mut conditions = Vec::new();
        if filter.status.is_some() {
            conditions.push("status = ?");
        }
        if filter.flow_type.is_some() {
            conditions.push("flow_type = ?");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM jobs {where_clause} \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ? OFFSET ?"
        );

        let mut q = sqlx::query_as::<_, Job>(&query);
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(flow) = filter.flow_type {
            q = q.bind(flow.as_str());
        }
        q.bind(filter.limit).bind(filter.offset).fetch_all(pool).await
    }

    pub async fn count_by_status(pool: &SqlitePool, status: JobStatus) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(pool)
            .await
    }

    /// Ids of all RUNNING jobs, oldest first.
    pub async fn running_ids(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT id FROM jobs WHERE status = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(JobStatus::Running.as_str())
        .fetch_all(pool)
        .await
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// The oldest claimable job: PENDING with no worker assigned.
    ///
    /// Ties on `created_at` fall back to insertion order.
    pub async fn oldest_pending_id(pool: &SqlitePool) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT id FROM jobs \
             WHERE status = ? AND worker_pid IS NULL \
             ORDER BY created_at ASC, rowid ASC \
             LIMIT 1",
        )
        .bind(JobStatus::Pending.as_str())
        .fetch_optional(pool)
        .await
    }

    /// Compare-and-swap PENDING -> RUNNING.
    ///
    /// Returns `false` when the row was no longer PENDING or already had a
    /// worker; the statement commits on its own before returning.
    pub async fn try_claim(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ? \
             WHERE id = ? AND status = ? AND worker_pid IS NULL",
        )
        .bind(JobStatus::Running.as_str())
        .bind(id)
        .bind(JobStatus::Pending.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record the spawned worker's pid on a job that is still RUNNING.
    pub async fn set_worker_pid(pool: &SqlitePool, id: &str, pid: u32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE jobs SET worker_pid = ? WHERE id = ? AND status = ?")
            .bind(i64::from(pid))
            .bind(id)
            .bind(JobStatus::Running.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Undo a claim whose worker could not be spawned.
    pub async fn release_claim(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ? \
             WHERE id = ? AND status = ? AND worker_pid IS NULL",
        )
        .bind(JobStatus::Pending.as_str())
        .bind(id)
        .bind(JobStatus::Running.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Worker transitions
    // -----------------------------------------------------------------------

    /// Re-assert RUNNING from the worker process.
    ///
    /// Returns `false` when the job already reached a terminal status (for
    /// example it was cancelled before the worker got going).
    pub async fn mark_running(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE jobs SET status = ? WHERE id = ? AND status IN (?, ?)")
            .bind(JobStatus::Running.as_str())
            .bind(id)
            .bind(JobStatus::Pending.as_str())
            .bind(JobStatus::Running.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist every item outcome and the job's terminal status atomically.
    ///
    /// `results[i]` is written to the item with `idx = i`. Nothing is written
    /// (and `false` is returned) when the job is no longer RUNNING.
    pub async fn complete(
        pool: &SqlitePool,
        id: &str,
        results: &[ItemResult],
        status: JobStatus,
        summary: &JobSummary,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let job = sqlx::query(
            "UPDATE jobs \
             SET status = ?, finished_at = ?, count_done = ?, count_failed = ?, \
                 count_cancelled = ?, worker_pid = NULL \
             WHERE id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(summary.done as i64)
        .bind(summary.failed as i64)
        .bind(summary.cancelled as i64)
        .bind(id)
        .bind(JobStatus::Running.as_str())
        .execute(&mut *tx)
        .await?;

        if job.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for (idx, result) in results.iter().enumerate() {
            if !JobItemRepo::record_result(&mut tx, id, idx, result, now).await? {
                tracing::warn!(job_id = %id, idx, "No job item matched runner result");
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Mark a non-terminal job FAILED and release its worker slot.
    pub async fn fail(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status = ?, worker_pid = NULL, finished_at = ?, {COUNTS_FROM_ITEMS} \
             WHERE id = ? AND status IN (?, ?)"
        );
        let result = sqlx::query(&query)
            .bind(JobStatus::Failed.as_str())
            .bind(Utc::now())
            .bind(id)
            .bind(JobStatus::Pending.as_str())
            .bind(JobStatus::Running.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Cancellation and reconciliation
    // -----------------------------------------------------------------------

    /// Cancel a PENDING or RUNNING job together with its unfinished items.
    ///
    /// Returns the number of items cancelled, or `None` when the job was
    /// already terminal (nothing is changed in that case).
    pub async fn cancel(pool: &SqlitePool, id: &str) -> Result<Option<u64>, sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let items = JobItemRepo::cancel_unfinished(&mut tx, id, None, None, now).await?;

        let query = format!(
            "UPDATE jobs \
             SET status = ?, worker_pid = NULL, finished_at = ?, {COUNTS_FROM_ITEMS} \
             WHERE id = ? AND status IN (?, ?)"
        );
        let job = sqlx::query(&query)
            .bind(JobStatus::Cancelled.as_str())
            .bind(now)
            .bind(id)
            .bind(JobStatus::Pending.as_str())
            .bind(JobStatus::Running.as_str())
            .execute(&mut *tx)
            .await?;

        if job.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(items))
    }

    /// Fail a RUNNING job whose worker is gone.
    ///
    /// Unfinished items become CANCELLED with a `SYSTEM_FAILURE` code and
    /// `message`; finished items are untouched. The whole job is repaired in
    /// one transaction. Returns `None` when the job is not RUNNING.
    pub async fn fail_orphaned(
        pool: &SqlitePool,
        id: &str,
        message: &str,
    ) -> Result<Option<u64>, sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let items = JobItemRepo::cancel_unfinished(
            &mut tx,
            id,
            Some(ItemStatus::SystemFailure.as_str()),
            Some(message),
            now,
        )
        .await?;

        let query = format!(
            "UPDATE jobs \
             SET status = ?, worker_pid = NULL, finished_at = ?, {COUNTS_FROM_ITEMS} \
             WHERE id = ? AND status = ?"
        );
        let job = sqlx::query(&query)
            .bind(JobStatus::Failed.as_str())
            .bind(now)
            .bind(id)
            .bind(JobStatus::Running.as_str())
            .execute(&mut *tx)
            .await?;

        if job.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(items))
    }
}
