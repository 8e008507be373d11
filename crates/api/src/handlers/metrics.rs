//! Handler for the metrics endpoint.

use autosuite_core::error::CoreError;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::ApiKey;
use crate::prometheus;
use crate::state::AppState;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /api/v1/metrics
///
/// 404 when metrics are disabled.
pub async fn render_metrics(
    _key: ApiKey,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let handle = state.metrics.as_ref().ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "endpoint",
            id: "metrics".to_string(),
        })
    })?;

    let body = prometheus::render(&state.pool, handle).await?;
    Ok(([(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body))
}
