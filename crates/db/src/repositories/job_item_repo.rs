//! Repository for the `job_items` table.

use autosuite_core::error_code::ErrorCode;
use autosuite_core::result::ItemResult;
use autosuite_core::status::ItemStatus;
use autosuite_core::types::{JsonMap, Timestamp};
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::models::job_item::JobItem;

/// Column list for `job_items` queries.
const COLUMNS: &str = "\
    id, job_id, idx, status, retry_count, error_code, error_message, \
    input, output, timings, extras, created_at, finished_at";

/// Provides access to the ordered items of a job.
pub struct JobItemRepo;

impl JobItemRepo {
    /// All items of a job ordered by `idx`.
    pub async fn list_by_job(pool: &SqlitePool, job_id: &str) -> Result<Vec<JobItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_items WHERE job_id = ? ORDER BY idx ASC");
        sqlx::query_as::<_, JobItem>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    /// Number of items per terminal status across all jobs, ordered by status.
    pub async fn count_finished_by_status(
        pool: &SqlitePool,
    ) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM job_items \
             WHERE status NOT IN (?, ?) \
             GROUP BY status ORDER BY status",
        )
        .bind(ItemStatus::Pending.as_str())
        .bind(ItemStatus::Running.as_str())
        .fetch_all(pool)
        .await
    }

    pub(crate) async fn insert(
        tx: &mut Transaction<'_, Sqlite>,
        job_id: &str,
        idx: usize,
        input: &JsonMap,
        created_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO job_items (id, job_id, idx, status, retry_count, input, created_at) \
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(job_id)
        .bind(idx as i64)
        .bind(ItemStatus::Pending.as_str())
        .bind(Json(input))
        .bind(created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Write one runner outcome onto the item at `(job_id, idx)`.
    ///
    /// `ErrorCode::None` is stored as a NULL error code and empty
    /// timings/extras as NULL. A DONE item always stores its output, even
    /// `{}`, so a finished item carries either an output or an error code.
    pub(crate) async fn record_result(
        tx: &mut Transaction<'_, Sqlite>,
        job_id: &str,
        idx: usize,
        result: &ItemResult,
        finished_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let error_code = match result.error_code {
            ErrorCode::None => None,
            code => Some(code.as_str()),
        };

        let stores_output = result.status == ItemStatus::Done || !result.output.is_empty();

        let outcome = sqlx::query(
            "UPDATE job_items \
             SET status = ?, retry_count = ?, error_code = ?, error_message = ?, \
                 output = ?, timings = ?, extras = ?, finished_at = ? \
             WHERE job_id = ? AND idx = ?",
        )
        .bind(result.status.as_str())
        .bind(i64::from(result.retry_count))
        .bind(error_code)
        .bind(result.error_message.as_deref())
        .bind(stores_output.then(|| Json(&result.output)))
        .bind((!result.timings.is_empty()).then(|| Json(&result.timings)))
        .bind((!result.extras.is_empty()).then(|| Json(&result.extras)))
        .bind(finished_at)
        .bind(job_id)
        .bind(idx as i64)
        .execute(&mut **tx)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Cancel every item of a job that has not finished yet.
    ///
    /// Returns the number of items touched. Finished items are left alone.
    pub(crate) async fn cancel_unfinished(
        tx: &mut Transaction<'_, Sqlite>,
        job_id: &str,
        error_code: Option<&str>,
        error_message: Option<&str>,
        finished_at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE job_items \
             SET status = ?, error_code = COALESCE(?, error_code), \
                 error_message = COALESCE(?, error_message), finished_at = ? \
             WHERE job_id = ? AND finished_at IS NULL",
        )
        .bind(ItemStatus::Cancelled.as_str())
        .bind(error_code)
        .bind(error_message)
        .bind(finished_at)
        .bind(job_id)
        .execute(&mut **tx)
        .await?;
        Ok(outcome.rows_affected())
    }
}
