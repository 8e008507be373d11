//! Worker process launching.
//!
//! The scheduler only needs "start a worker for this job and tell me its
//! pid"; [`WorkerLauncher`] is that seam. [`ProcessLauncher`] runs the
//! `autosuite-worker` executable directly (never through a shell) with the
//! job id as the only variable argument.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use autosuite_core::job_id::validate_job_id;
use autosuite_core::settings::Settings;
use tokio::process::Command;

use crate::error::LaunchError;

/// Executable name of the worker binary built from this crate.
pub const WORKER_BIN_NAME: &str = "autosuite-worker";

/// Starts a worker for a claimed job and returns its OS process id.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, job_id: &str) -> Result<u32, LaunchError>;
}

/// Launches `<program> --job-id <id>` as a detached child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use `worker_bin` from settings, or the worker binary installed next
    /// to the current executable.
    pub fn from_settings(settings: &Settings) -> Result<Self, LaunchError> {
        if let Some(path) = &settings.worker_bin {
            return Ok(Self::new(path.clone()));
        }

        let current = std::env::current_exe().map_err(LaunchError::Executable)?;
        let dir = current.parent().map(PathBuf::from).unwrap_or_default();
        Ok(Self::new(dir.join(format!(
            "{WORKER_BIN_NAME}{}",
            std::env::consts::EXE_SUFFIX
        ))))
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, job_id: &str) -> Result<u32, LaunchError> {
        validate_job_id(job_id).map_err(|_| LaunchError::InvalidJobId(job_id.to_string()))?;

        let mut child = Command::new(&self.program)
            .arg("--job-id")
            .arg(job_id)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                job_id: job_id.to_string(),
                source,
            })?;

        let pid = child
            .id()
            .ok_or_else(|| LaunchError::NoPid(job_id.to_string()))?;

        tracing::info!(job_id = %job_id, pid, program = %self.program.display(), "Worker spawned");

        // Reap the child so it never lingers as a zombie.
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::debug!(job_id = %job_id, pid, "Worker exited");
                }
                Ok(status) => {
                    tracing::warn!(job_id = %job_id, pid, %status, "Worker exited with failure");
                }
                Err(e) => {
                    tracing::warn!(job_id = %job_id, pid, error = %e, "Failed to wait on worker");
                }
            }
        });

        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn explicit_worker_bin_wins() {
        let settings = Settings {
            worker_bin: Some(PathBuf::from("/opt/autosuite/bin/worker")),
            ..Settings::default()
        };
        let launcher = ProcessLauncher::from_settings(&settings).unwrap();
        assert_eq!(launcher.program(), std::path::Path::new("/opt/autosuite/bin/worker"));
    }

    #[test]
    fn default_worker_bin_sits_next_to_current_exe() {
        let launcher = ProcessLauncher::from_settings(&Settings::default()).unwrap();
        let name = launcher.program().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(WORKER_BIN_NAME));
    }

    #[tokio::test]
    async fn invalid_id_is_rejected_before_spawning() {
        let launcher = ProcessLauncher::new("/bin/true");
        let err = launcher.launch("a; rm -rf /").await.unwrap_err();
        assert_matches!(err, LaunchError::InvalidJobId(id) if id == "a; rm -rf /");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let launcher = ProcessLauncher::new("/nonexistent/autosuite-worker");
        let err = launcher.launch("job-1").await.unwrap_err();
        assert_matches!(err, LaunchError::Spawn { job_id, .. } if job_id == "job-1");
    }
}
