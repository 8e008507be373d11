//! Periodic scheduling pass.
//!
//! Jobs are normally admitted when one is created, cancelled or finished.
//! This loop catches anything those triggers miss, such as a PENDING job
//! left behind after a failed launch.

use std::time::Duration;

use autosuite_worker::Scheduler;
use tokio_util::sync::CancellationToken;

/// Run `schedule_jobs` every `every` until `cancel` is triggered.
pub async fn run(scheduler: Scheduler, every: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = every.as_secs(),
        max_workers = scheduler.max_workers(),
        "Schedule sweep started"
    );

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Schedule sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match scheduler.schedule_jobs().await {
                    Ok(report) if report.is_empty() => {
                        tracing::debug!("Schedule sweep: nothing to claim");
                    }
                    Ok(report) => {
                        tracing::info!(claimed = ?report.claimed, "Schedule sweep: jobs launched");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Schedule sweep failed");
                    }
                }
            }
        }
    }
}
