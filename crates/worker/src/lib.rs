//! Job scheduling and the per-job worker process.
//!
//! The scheduler admits PENDING jobs into a bounded number of RUNNING slots
//! and launches one worker process per claimed job. Workers run the job's
//! items through the engine and write the results back. Coordination
//! happens only through the `jobs` rows: every transition is a guarded
//! UPDATE, so concurrent schedulers in different processes stay safe.

pub mod cancel;
pub mod error;
pub mod launcher;
pub mod metrics;
pub mod reconcile;
pub mod scheduler;
pub mod telemetry;
pub mod worker;

pub use cancel::{cancel_job, CancelOutcome};
pub use error::{LaunchError, WorkerError};
pub use launcher::{ProcessLauncher, WorkerLauncher};
pub use reconcile::{reconcile_stale_jobs, ReconcileReport};
pub use scheduler::{ScheduleReport, Scheduler};
pub use worker::{execute_job, JobOutcome};
