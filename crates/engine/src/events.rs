//! Runner lifecycle events.
//!
//! Every event is logged through `tracing` and fanned out on a
//! `tokio::sync::broadcast` channel so in-process observers (tests, a
//! future progress feed) can follow a run.

use autosuite_core::flow::FlowType;
use autosuite_core::status::{ItemStatus, JobStatus};
use serde::Serialize;
use tokio::sync::broadcast;

/// A state change during one `run_job` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    JobStarted {
        job_id: String,
        flow: FlowType,
    },
    ItemStarted {
        job_id: String,
        idx: usize,
    },
    ItemFinished {
        job_id: String,
        idx: usize,
        status: ItemStatus,
    },
    JobFinished {
        job_id: String,
        flow: FlowType,
        status: JobStatus,
    },
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out publisher for [`RunEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Log the event and deliver it to current subscribers.
    pub fn publish(&self, event: RunEvent) {
        match &event {
            RunEvent::JobStarted { job_id, flow } => {
                tracing::info!(job_id = %job_id, flow = %flow, "Job started");
            }
            RunEvent::ItemStarted { job_id, idx } => {
                tracing::debug!(job_id = %job_id, idx, "Item started");
            }
            RunEvent::ItemFinished {
                job_id,
                idx,
                status,
            } => {
                tracing::info!(job_id = %job_id, idx, status = %status, "Item finished");
            }
            RunEvent::JobFinished {
                job_id,
                flow,
                status,
            } => {
                tracing::info!(job_id = %job_id, flow = %flow, status = %status, "Job finished");
            }
        }
        // A send error only means nobody is subscribed.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
