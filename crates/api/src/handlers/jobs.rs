//! Handlers for the `/jobs` resource.
//!
//! All endpoints take the [`ApiKey`] guard.

use autosuite_core::error::CoreError;
use autosuite_core::flow::FlowType;
use autosuite_core::job_id::new_job_id;
use autosuite_core::types::{JsonMap, Timestamp};
use autosuite_db::models::job::{Job, JobCounts, JobFilter, NewJob};
use autosuite_db::models::job_item::JobItem;
use autosuite_db::repositories::{CreateOutcome, JobItemRepo, JobRepo};
use autosuite_engine::input::pretty_input_text;
use autosuite_worker::cancel;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::ApiKey;
use crate::query::JobListParams;
use crate::state::AppState;

/// Header whose value makes job creation idempotent.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    pub flow_type: String,
    #[validate(length(min = 1, message = "items must contain at least one entry"))]
    pub items: Vec<JsonMap>,
    #[serde(default)]
    pub options: JsonMap,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: String,
    pub items_count: usize,
}

/// Job summary as returned by the list, get and cancel endpoints.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: String,
    pub flow_type: String,
    pub status: String,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub counts: JobCounts,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            flow_type: job.flow_type.clone(),
            status: job.status.clone(),
            created_at: job.created_at,
            finished_at: job.finished_at,
            counts: JobCounts::from(job),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub items: Vec<JobView>,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Serialize)]
pub struct JobItemsResponse {
    pub job_id: String,
    pub items: Vec<JobItem>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_job(state: &AppState, job_id: &str) -> AppResult<Job> {
    JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "job",
                id: job_id.to_string(),
            })
        })
}

/// Map a body extraction failure; oversized bodies become 413.
fn reject_body(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("payload_too_large".into())
    } else {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Stamp an item's `meta` with its position and a readable `raw_text`.
///
/// User-supplied meta keys win over `idx`; a non-blank user `raw_text` is
/// kept as is.
fn enrich_item(idx: usize, mut item: JsonMap) -> JsonMap {
    let mut meta = JsonMap::new();
    meta.insert("idx".into(), Value::from(idx));
    if let Some(Value::Object(user)) = item.get("meta") {
        meta.extend(user.clone());
    }

    let has_raw_text = meta
        .get("raw_text")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !has_raw_text {
        meta.insert("raw_text".into(), Value::String(pretty_input_text(&item)));
    }

    item.insert("meta".into(), Value::Object(meta));
    item
}

fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// A key collision whose job row cannot be loaded back is a 409.
fn idempotency_conflict(key: &str, err: sqlx::Error) -> AppError {
    if autosuite_db::is_unique_violation(&err) {
        AppError::Core(CoreError::Conflict(format!(
            "idempotency key '{key}' collides with a job that could not be loaded"
        )))
    } else {
        AppError::Database(err)
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a PENDING job and its items, then try to schedule it. Returns 201
/// for a new job. With an `Idempotency-Key` that was already used for the
/// same flow, returns 200 with the existing job instead.
pub async fn create_job(
    _key: ApiKey,
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload.map_err(reject_body)?;
    input
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    if input.items.len() > state.settings.max_items_per_job {
        return Err(AppError::PayloadTooLarge("too_many_items".into()));
    }

    let flow = input
        .flow_type
        .trim()
        .parse::<FlowType>()
        .map_err(|_| CoreError::UnsupportedFlow(input.flow_type.clone()))?;
    let adapter = state.registry.get(flow)?;

    let issues = adapter.api_prevalidate(&input.items);
    if !issues.is_empty() {
        return Err(AppError::InvalidItems(issues));
    }

    let key = idempotency_key(&headers);
    let new_job = NewJob {
        id: new_job_id(flow, key),
        flow_type: flow,
        options: input.options,
        items: input
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| enrich_item(idx, item))
            .collect(),
    };

    let outcome = match key {
        Some(key) => JobRepo::create_or_existing(&state.pool, &new_job)
            .await
            .map_err(|e| idempotency_conflict(key, e))?,
        None => CreateOutcome::Created(JobRepo::create(&state.pool, &new_job).await?),
    };

    match outcome {
        CreateOutcome::Created(job) => {
            tracing::info!(
                job_id = %job.id,
                flow = %flow,
                items = new_job.items.len(),
                "Job created",
            );

            if let Err(e) = state.scheduler.schedule_jobs().await {
                tracing::error!(job_id = %job.id, error = %e, "Scheduling after create failed");
            }

            Ok((
                StatusCode::CREATED,
                Json(CreateJobResponse {
                    job_id: job.id,
                    status: job.status,
                    items_count: new_job.items.len(),
                }),
            ))
        }
        CreateOutcome::Existing(job) => {
            let items_count = JobItemRepo::list_by_job(&state.pool, &job.id).await?.len();
            tracing::info!(job_id = %job.id, "Idempotent resubmission, returning existing job");

            Ok((
                StatusCode::OK,
                Json(CreateJobResponse {
                    job_id: job.id,
                    status: job.status,
                    items_count,
                }),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Newest first. Supports `page`, `page_size`, `status` and `flow_type`.
pub async fn list_jobs(
    _key: ApiKey,
    State(state): State<AppState>,
    Query(params): Query<JobListParams>,
) -> AppResult<Json<JobListResponse>> {
    let page = params.page(&state.settings);
    let filter = JobFilter {
        status: params.status()?,
        flow_type: params.flow_type()?,
        limit: i64::from(page.page_size),
        offset: page.offset(),
    };

    let jobs = JobRepo::list(&state.pool, &filter).await?;

    Ok(Json(JobListResponse {
        items: jobs.iter().map(JobView::from).collect(),
        page: page.page,
        page_size: page.page_size,
    }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    _key: ApiKey,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobView>> {
    let job = find_job(&state, &job_id).await?;
    Ok(Json(JobView::from(&job)))
}

/// GET /api/v1/jobs/{id}/items
pub async fn list_job_items(
    _key: ApiKey,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobItemsResponse>> {
    let job = find_job(&state, &job_id).await?;
    let items = JobItemRepo::list_by_job(&state.pool, &job.id).await?;
    Ok(Json(JobItemsResponse {
        job_id: job.id,
        items,
    }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Cancel a PENDING or RUNNING job. A job that already finished is
/// returned unchanged.
pub async fn cancel_job(
    _key: ApiKey,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobView>> {
    let outcome = cancel::cancel_job(&state.pool, &state.scheduler, &job_id).await?;
    Ok(Json(JobView::from(outcome.job())))
}
