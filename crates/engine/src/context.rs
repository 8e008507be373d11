//! Per-job context threaded through every hook call.

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use autosuite_core::flow::FlowType;
use autosuite_core::types::JsonMap;

use crate::session::{Page, Session, SessionSpec};

/// Mutable state shared by the hooks of one job run.
///
/// The typed fields cover what every session-backed flow needs. Anything
/// else a flow wants to keep between hook calls goes into the resource map
/// via [`insert`](Self::insert) / [`get`](Self::get).
pub struct JobContext {
    pub job_id: String,
    pub flow: FlowType,
    pub options: JsonMap,
    pub spec: SessionSpec,
    pub page_reuse: bool,
    /// Long-lived session opened by `before_job` (or per item).
    pub session: Option<Arc<dyn Session>>,
    /// Position of the item in flight.
    pub item_idx: usize,
    /// Page handed out by the most recent `before_item`.
    pub page: Option<Arc<dyn Page>>,
    /// Trace file for the item in flight, when tracing is on.
    pub trace_path: Option<PathBuf>,
    resources: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>, flow: FlowType, options: JsonMap, spec: SessionSpec) -> Self {
        let page_reuse = spec.page_reuse;
        Self {
            job_id: job_id.into(),
            flow,
            options,
            spec,
            page_reuse,
            session: None,
            item_idx: 0,
            page: None,
            trace_path: None,
            resources: HashMap::new(),
        }
    }

    /// Attach an adapter-specific resource, replacing any previous value.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: &'static str, value: T) {
        self.resources.insert(key, Box::new(value));
    }

    /// Borrow a resource if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &'static str) -> Option<&T> {
        self.resources.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self, key: &'static str) -> Option<&mut T> {
        self.resources.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Take a resource out of the context.
    ///
    /// A value of a different type is left in place and `None` is returned.
    pub fn remove<T: Any + Send + Sync>(&mut self, key: &'static str) -> Option<T> {
        match self.resources.remove(key)?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.resources.insert(key, other);
                None
            }
        }
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("flow", &self.flow)
            .field("page_reuse", &self.page_reuse)
            .field("item_idx", &self.item_idx)
            .field("has_session", &self.session.is_some())
            .field("has_page", &self.page.is_some())
            .field("trace_path", &self.trace_path)
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .finish()
    }
}
