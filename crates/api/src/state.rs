use std::sync::Arc;

use autosuite_core::settings::Settings;
use autosuite_engine::FlowRegistry;
use autosuite_worker::Scheduler;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: autosuite_db::DbPool,
    /// Job and runner settings (limits, API key, paging).
    pub settings: Arc<Settings>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Flow implementations, used for pre-validation and descriptors.
    pub registry: Arc<FlowRegistry>,
    /// Admits PENDING jobs after creation and cancellation.
    pub scheduler: Scheduler,
    /// Render handle of the installed recorder; `None` when metrics are off.
    pub metrics: Option<PrometheusHandle>,
}
