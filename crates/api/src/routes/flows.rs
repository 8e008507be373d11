use axum::routing::get;
use axum::Router;

use crate::handlers::flows;
use crate::state::AppState;

/// Routes mounted at `/flows`.
///
/// ```text
/// GET    /                        -> list_flows
/// GET    /{slug}/input-spec       -> input_spec
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(flows::list_flows))
        .route("/{slug}/input-spec", get(flows::input_spec))
}
