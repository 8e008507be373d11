use axum::routing::get;
use axum::Router;

use crate::handlers::metrics;
use crate::state::AppState;

/// Routes mounted at the API root.
///
/// ```text
/// GET    /metrics                 -> render_metrics
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics::render_metrics))
}
