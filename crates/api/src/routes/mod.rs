pub mod flows;
pub mod health;
pub mod jobs;
pub mod metrics;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                                   list, create
/// /jobs/{id}                              get
/// /jobs/{id}/items                        items ordered by idx
/// /jobs/{id}/cancel                       cancel
///
/// /flows                                  registered flows
/// /flows/{slug}/input-spec                declared input fields
///
/// /metrics                                Prometheus exposition
/// ```
///
/// Every handler takes the [`ApiKey`](crate::middleware::auth::ApiKey) guard.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/flows", flows::router())
        .merge(metrics::router())
}
