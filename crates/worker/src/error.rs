use autosuite_core::error::CoreError;

/// Failure to start a worker process.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("invalid job id '{0}'")]
    InvalidJobId(String),

    #[error("cannot locate worker executable: {0}")]
    Executable(#[source] std::io::Error),

    #[error("failed to spawn worker for job {job_id}: {source}")]
    Spawn {
        job_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker for job {0} exited before reporting a pid")]
    NoPid(String),
}

/// Errors surfaced by scheduling, reconciliation and job execution.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}
