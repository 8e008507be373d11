//! Session layer: the page handle contract flows drive, and the providers
//! that build one.
//!
//! Flows never construct sessions themselves. A [`SessionProvider`] turns
//! the flow's declared [`SessionSpec`] into a live [`Session`], and the
//! flow's hooks ask that session for pages.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use autosuite_core::error_code::FlowError;
use autosuite_core::flow::{ContextPer, SessionMode};
use serde::Serialize;

pub mod http;
pub mod lifecycle;
pub mod secrets;
pub mod seed;

pub use http::HttpSessionProvider;

/// What a flow needs from its execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSpec {
    pub mode: SessionMode,
    /// Secret file names (without extension) resolved under the secrets dir.
    pub secret_names: Vec<String>,
    pub context_per: ContextPer,
    /// Keep one page across items instead of opening a fresh one per item.
    pub page_reuse: bool,
}

impl SessionSpec {
    pub fn non_auth() -> Self {
        Self {
            mode: SessionMode::NonAuth,
            secret_names: Vec::new(),
            context_per: ContextPer::Job,
            page_reuse: false,
        }
    }
}

/// Response facts of a completed navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub status: Option<u16>,
    pub url: String,
}

/// A single page (tab) inside a session.
///
/// Selectors are CSS-style strings; how much of CSS a driver understands is
/// up to the driver. Unsupported operations fail with `NAVIGATION_ERROR`.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> Result<Navigation, FlowError>;

    /// Current document title, trimmed.
    async fn title(&self) -> Result<String, FlowError>;

    /// URL of the current document after redirects.
    async fn url(&self) -> String;

    /// `<meta>` name/property -> content pairs of the current document.
    async fn meta_tags(&self) -> Result<BTreeMap<String, String>, FlowError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), FlowError>;

    async fn click(&self, selector: &str) -> Result<(), FlowError>;

    /// Click the `index`-th element matching `selector`.
    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), FlowError>;

    /// Wait until an element matching `selector` is present.
    async fn wait_for(&self, selector: &str) -> Result<(), FlowError>;

    /// Inner text of every element matching `selector`, in document order.
    async fn texts(&self, selector: &str) -> Result<Vec<String>, FlowError>;

    async fn is_visible(&self, selector: &str) -> Result<bool, FlowError>;

    async fn close(&self) -> Result<(), FlowError>;

    /// Inner text of the first element matching `selector`.
    async fn text(&self, selector: &str) -> Result<String, FlowError> {
        self.texts(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::navigation(format!("no element matches '{selector}'")))
    }
}

/// A browsing context (cookie jar, profile, trace recorder) that pages share.
#[async_trait]
pub trait Session: Send + Sync {
    async fn new_page(&self) -> Result<Arc<dyn Page>, FlowError>;

    async fn start_tracing(&self) -> Result<(), FlowError>;

    /// Stop the current trace, writing it to `path` or discarding it.
    async fn stop_tracing(&self, path: Option<&Path>) -> Result<(), FlowError>;

    async fn close(&self) -> Result<(), FlowError>;
}

/// Builds sessions for a [`SessionSpec`].
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self, spec: &SessionSpec) -> Result<Arc<dyn Session>, FlowError>;
}
