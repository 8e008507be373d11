//! Session lifecycle shared by the session-backed flows.
//!
//! Flows delegate their `before_job` / `before_item` / `after_item` /
//! `after_job` hooks here: one session per job (or per item), a fresh or
//! reused page per item, and per-item traces.

use std::path::PathBuf;
use std::sync::Arc;

use autosuite_core::error_code::FlowError;
use autosuite_core::flow::{ContextPer, FlowType};
use autosuite_core::result::JobSummary;
use autosuite_core::settings::{Settings, TraceMode};
use autosuite_core::status::ItemStatus;

use super::{Page, Session, SessionProvider};
use crate::context::JobContext;
use crate::hooks::ItemView;

/// Builds and tears down the session resources kept on a [`JobContext`].
pub struct SessionLifecycle {
    settings: Arc<Settings>,
    sessions: Arc<dyn SessionProvider>,
}

impl SessionLifecycle {
    pub fn new(settings: Arc<Settings>, sessions: Arc<dyn SessionProvider>) -> Self {
        Self { settings, sessions }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Open the job-wide session when the flow asks for one per job.
    pub async fn before_job(&self, ctx: &mut JobContext) -> Result<(), FlowError> {
        if ctx.spec.context_per == ContextPer::Job {
            ctx.session = Some(self.sessions.open(&ctx.spec).await?);
        }
        tracing::info!(
            job_id = %ctx.job_id,
            context_per = %ctx.spec.context_per,
            page_reuse = ctx.page_reuse,
            "Session lifecycle started"
        );
        Ok(())
    }

    /// A ready page for the next item, with tracing started when enabled.
    pub async fn before_item(&self, ctx: &mut JobContext) -> Result<Arc<dyn Page>, FlowError> {
        let session = match &ctx.session {
            Some(session) => session.clone(),
            None => {
                let session = self.sessions.open(&ctx.spec).await?;
                ctx.session = Some(session.clone());
                session
            }
        };

        let page = match (&ctx.page, ctx.page_reuse) {
            (Some(page), true) => page.clone(),
            _ => session.new_page().await?,
        };
        ctx.page = Some(page.clone());

        if self.settings.tracing_mode != TraceMode::Off {
            match session.start_tracing().await {
                Ok(()) => {
                    ctx.trace_path = Some(trace_path(
                        &self.settings.artifacts_dir,
                        ctx.flow,
                        &ctx.job_id,
                        ctx.item_idx,
                    ));
                }
                Err(err) => tracing::error!(job_id = %ctx.job_id, error = %err, "Failed to start tracing"),
            }
        }

        Ok(page)
    }

    /// Stop the item's trace, attach its path, and release per-item resources.
    pub async fn after_item(&self, ctx: &mut JobContext, view: &mut ItemView) {
        if let (Some(path), Some(session)) = (ctx.trace_path.take(), ctx.session.clone()) {
            let keep = self.settings.tracing_mode == TraceMode::On || view.status != ItemStatus::Done;
            let target = keep.then_some(path.as_path());
            match session.stop_tracing(target).await {
                Ok(()) if keep => {
                    view.extras
                        .insert("trace_path".into(), path.display().to_string().into());
                }
                Ok(()) => {}
                Err(err) => tracing::error!(job_id = %ctx.job_id, error = %err, "Failed to stop tracing"),
            }
        }

        if !ctx.page_reuse {
            if let Some(page) = ctx.page.take() {
                if let Err(err) = page.close().await {
                    tracing::warn!(job_id = %ctx.job_id, error = %err, "Failed to close page");
                }
            }
        }

        if ctx.spec.context_per == ContextPer::Item {
            close_session(ctx).await;
        }
    }

    /// Close whatever the job still holds.
    pub async fn after_job(&self, ctx: &mut JobContext, summary: &JobSummary) {
        if let Some(page) = ctx.page.take() {
            if let Err(err) = page.close().await {
                tracing::warn!(job_id = %ctx.job_id, error = %err, "Failed to close page");
            }
        }
        close_session(ctx).await;
        tracing::info!(
            job_id = %ctx.job_id,
            done = summary.done,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Session lifecycle finished"
        );
    }
}

async fn close_session(ctx: &mut JobContext) {
    let session: Option<Arc<dyn Session>> = ctx.session.take();
    if let Some(session) = session {
        if let Err(err) = session.close().await {
            tracing::error!(job_id = %ctx.job_id, error = %err, "Failed to close session");
        }
    }
}

/// `{artifacts}/trace/{FLOW}/{job_id}/item-{idx}.json`
pub fn trace_path(artifacts_dir: &std::path::Path, flow: FlowType, job_id: &str, idx: usize) -> PathBuf {
    artifacts_dir
        .join("trace")
        .join(flow.as_str())
        .join(job_id)
        .join(format!("item-{idx}.json"))
}
