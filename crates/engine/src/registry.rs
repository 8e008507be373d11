//! Flow type -> implementation lookup.

use std::collections::HashMap;
use std::sync::Arc;

use autosuite_core::error::CoreError;
use autosuite_core::flow::FlowType;
use autosuite_core::settings::Settings;

use crate::flows::crawl_simple::CrawlSimple;
use crate::flows::sauce_demo::SauceDemo;
use crate::hooks::{FlowAdapter, FlowDescriptor, RegisteredFlow};
use crate::session::{HttpSessionProvider, SessionProvider};

/// Fixed set of flows available to the runner and the API.
#[derive(Default)]
pub struct FlowRegistry {
    flows: HashMap<FlowType, Arc<dyn RegisteredFlow>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in flows, sharing one session provider.
    pub fn builtin(settings: Arc<Settings>, sessions: Arc<dyn SessionProvider>) -> Self {
        let mut registry = Self::new();
        registry.register(CrawlSimple::new(settings.clone(), sessions.clone()));
        registry.register(SauceDemo::new(settings, sessions));
        registry
    }

    /// Built-in flows backed by the HTTP session driver.
    pub fn with_http_sessions(settings: Arc<Settings>) -> Self {
        let sessions: Arc<dyn SessionProvider> = Arc::new(HttpSessionProvider::new(&settings));
        Self::builtin(settings, sessions)
    }

    /// Register (or replace) the implementation for the adapter's flow type.
    pub fn register<A>(&mut self, adapter: A)
    where
        A: FlowAdapter + 'static,
    {
        let flow = adapter.flow_type();
        self.flows.insert(flow, Arc::new(adapter));
    }

    pub fn get(&self, flow: FlowType) -> Result<Arc<dyn RegisteredFlow>, CoreError> {
        self.flows
            .get(&flow)
            .cloned()
            .ok_or_else(|| CoreError::UnsupportedFlow(flow.to_string()))
    }

    /// Descriptors of every registered flow in declaration order.
    pub fn descriptors(&self) -> Vec<FlowDescriptor> {
        FlowType::ALL
            .iter()
            .filter_map(|flow| self.flows.get(flow))
            .map(|flow| flow.descriptor())
            .collect()
    }
}

impl std::fmt::Debug for FlowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRegistry")
            .field("flows", &self.flows.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_registry_reports_unsupported_flow() {
        let registry = FlowRegistry::new();
        assert_matches!(
            registry.get(FlowType::CrawlSimple).err(),
            Some(CoreError::UnsupportedFlow(name)) if name == "CRAWL_SIMPLE"
        );
    }

    #[test]
    fn builtin_registry_covers_every_flow_type() {
        let settings = Arc::new(Settings::default());
        let registry = FlowRegistry::with_http_sessions(settings);
        for flow in FlowType::ALL {
            assert!(registry.get(*flow).is_ok(), "{flow} not registered");
        }
        let slugs: Vec<_> = registry.descriptors().iter().map(|d| d.slug).collect();
        assert_eq!(slugs, vec!["crawl-simple", "sauce-demo"]);
    }
}
