//! Test doubles shared by the unit tests of this crate.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use autosuite_core::error_code::FlowError;

use crate::session::{Navigation, Page, Session, SessionProvider, SessionSpec};

/// Provider whose sessions always hand out the same page.
pub struct FixedSessions {
    page: Arc<dyn Page>,
}

impl FixedSessions {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }
}

struct FixedSession {
    page: Arc<dyn Page>,
}

#[async_trait]
impl SessionProvider for FixedSessions {
    async fn open(&self, _spec: &SessionSpec) -> Result<Arc<dyn Session>, FlowError> {
        Ok(Arc::new(FixedSession {
            page: self.page.clone(),
        }))
    }
}

#[async_trait]
impl Session for FixedSession {
    async fn new_page(&self) -> Result<Arc<dyn Page>, FlowError> {
        Ok(self.page.clone())
    }

    async fn start_tracing(&self) -> Result<(), FlowError> {
        Ok(())
    }

    async fn stop_tracing(&self, _path: Option<&Path>) -> Result<(), FlowError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), FlowError> {
        Ok(())
    }
}

/// A page on which every action succeeds and nothing is ever found.
pub struct NullPage;

#[async_trait]
impl Page for NullPage {
    async fn goto(&self, url: &str) -> Result<Navigation, FlowError> {
        Ok(Navigation {
            status: Some(200),
            url: url.to_string(),
        })
    }

    async fn title(&self) -> Result<String, FlowError> {
        Ok(String::new())
    }

    async fn url(&self) -> String {
        "about:blank".to_string()
    }

    async fn meta_tags(&self) -> Result<BTreeMap<String, String>, FlowError> {
        Ok(BTreeMap::new())
    }

    async fn fill(&self, _selector: &str, _value: &str) -> Result<(), FlowError> {
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<(), FlowError> {
        Ok(())
    }

    async fn click_nth(&self, _selector: &str, _index: usize) -> Result<(), FlowError> {
        Ok(())
    }

    async fn wait_for(&self, _selector: &str) -> Result<(), FlowError> {
        Ok(())
    }

    async fn texts(&self, _selector: &str) -> Result<Vec<String>, FlowError> {
        Ok(Vec::new())
    }

    async fn is_visible(&self, _selector: &str) -> Result<bool, FlowError> {
        Ok(false)
    }

    async fn close(&self) -> Result<(), FlowError> {
        Ok(())
    }
}
