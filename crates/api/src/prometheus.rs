//! Prometheus exposition for `/api/v1/metrics`.

use autosuite_db::repositories::JobItemRepo;
use autosuite_db::DbPool;
use autosuite_worker::metrics;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the process-wide recorder and return its render handle.
///
/// Fails when a recorder is already installed.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics recorder: {e}"))?;
    metrics::describe();
    Ok(handle)
}

/// Render the exposition text.
///
/// Item counts are read from the database on every scrape because items are
/// finished by worker processes that export nothing themselves.
pub async fn render(pool: &DbPool, handle: &PrometheusHandle) -> Result<String, sqlx::Error> {
    let counts = JobItemRepo::count_finished_by_status(pool).await?;
    metrics::record_items_finished(&counts);
    Ok(handle.render())
}
