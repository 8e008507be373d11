//! Handlers for the `/flows` resource.

use std::collections::BTreeMap;

use autosuite_core::error::CoreError;
use autosuite_core::flow::{ContextPer, FlowType, SessionMode};
use autosuite_engine::hooks::FlowDescriptor;
use autosuite_engine::input::InputField;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::ApiKey;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub mode: SessionMode,
    pub context_per: ContextPer,
    pub page_reuse: bool,
}

#[derive(Debug, Serialize)]
pub struct FlowSummary {
    pub slug: &'static str,
    pub flow_type: FlowType,
    pub session: SessionView,
}

impl From<&FlowDescriptor> for FlowSummary {
    fn from(descriptor: &FlowDescriptor) -> Self {
        Self {
            slug: descriptor.slug,
            flow_type: descriptor.flow_type,
            session: SessionView {
                mode: descriptor.session.mode,
                context_per: descriptor.session.context_per,
                page_reuse: descriptor.session.page_reuse,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InputSpecResponse {
    pub slug: &'static str,
    pub flow_type: FlowType,
    pub fields: &'static [InputField],
    pub field_options: BTreeMap<&'static str, Vec<&'static str>>,
}

/// GET /api/v1/flows
pub async fn list_flows(_key: ApiKey, State(state): State<AppState>) -> Json<Vec<FlowSummary>> {
    Json(
        state
            .registry
            .descriptors()
            .iter()
            .map(FlowSummary::from)
            .collect(),
    )
}

/// GET /api/v1/flows/{slug}/input-spec
///
/// Declared input fields of one flow; unknown slugs are 404.
pub async fn input_spec(
    _key: ApiKey,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<InputSpecResponse>> {
    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "flow",
            id: slug.clone(),
        })
    };

    let flow = FlowType::from_slug(&slug).map_err(|_| not_found())?;
    let descriptor = state.registry.get(flow).map_err(|_| not_found())?.descriptor();

    Ok(Json(InputSpecResponse {
        slug: descriptor.slug,
        flow_type: descriptor.flow_type,
        fields: descriptor.fields,
        field_options: descriptor.field_options,
    }))
}
