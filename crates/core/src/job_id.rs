//! Job identifiers.
//!
//! Jobs submitted with an idempotency key get a UUID v5 derived from the flow
//! type and the key, so resubmissions collide on the same primary key. Jobs
//! without a key get a random UUID v4.

use uuid::Uuid;

use crate::error::CoreError;
use crate::flow::FlowType;

/// Longest job id accepted on the worker command line.
const MAX_JOB_ID_LEN: usize = 64;

/// Derive the id for a new job.
pub fn new_job_id(flow: FlowType, idempotency_key: Option<&str>) -> String {
    match idempotency_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => {
            let name = format!("job:{flow}:{key}");
            Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
        }
        None => Uuid::new_v4().to_string(),
    }
}

/// Check that a job id is safe to pass as a process argument.
///
/// Only ASCII alphanumerics, `-` and `_` are accepted, up to 64 characters,
/// and the id may not start with `-` so it never reads as a flag.
pub fn validate_job_id(job_id: &str) -> Result<(), CoreError> {
    let valid = !job_id.is_empty()
        && job_id.len() <= MAX_JOB_ID_LEN
        && !job_id.starts_with('-')
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CoreError::Validation(format!("invalid job id '{job_id}'")))
    }
}
