//! Metric names shared by the scheduler and the API's exporter.
//!
//! Recording goes through the `metrics` facade. Without an installed
//! recorder every call is a no-op, so worker processes never export.

/// Jobs moved from PENDING to RUNNING by this process.
pub const JOBS_CLAIMED_TOTAL: &str = "autosuite_jobs_claimed_total";

/// Finished items per terminal status, labelled `status`.
pub const ITEMS_FINISHED: &str = "autosuite_items_finished";

/// Attach help text to the metrics above on the installed recorder.
pub fn describe() {
    ::metrics::describe_counter!(JOBS_CLAIMED_TOTAL, "Jobs claimed for execution");
    ::metrics::describe_gauge!(ITEMS_FINISHED, "Finished job items by status");
}

pub fn record_job_claimed() {
    ::metrics::counter!(JOBS_CLAIMED_TOTAL).increment(1);
}

/// Publish the current per-status item counts.
pub fn record_items_finished<'a>(counts: impl IntoIterator<Item = &'a (String, i64)>) {
    for (status, count) in counts {
        ::metrics::gauge!(ITEMS_FINISHED, "status" => status.clone()).set(*count as f64);
    }
}
