//! `CRAWL_SIMPLE`: open a URL and report basic page facts.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use autosuite_core::error_code::FlowError;
use autosuite_core::flow::FlowType;
use autosuite_core::result::{ActionResult, JobSummary};
use autosuite_core::settings::Settings;
use autosuite_core::types::{JsonMap, Timings};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::context::JobContext;
use crate::hooks::{FlowAdapter, FlowHooks, ItemView, ValidationIssue};
use crate::input::{meta, normalized_str, InputField};
use crate::session::lifecycle::SessionLifecycle;
use crate::session::{Page, SessionProvider, SessionSpec};

static FIELDS: &[InputField] = &[
    InputField::required("url", "Target URL"),
    InputField::optional("meta", "Raw input"),
];

#[derive(Debug, Deserialize, Validate)]
pub struct CrawlInput {
    #[validate(length(min = 4))]
    pub url: String,
    #[serde(default)]
    pub meta: JsonMap,
}

pub struct CrawlSimple {
    lifecycle: SessionLifecycle,
}

impl CrawlSimple {
    pub fn new(settings: Arc<Settings>, sessions: Arc<dyn SessionProvider>) -> Self {
        Self {
            lifecycle: SessionLifecycle::new(settings, sessions),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[async_trait]
impl FlowHooks for CrawlSimple {
    async fn before_job(&self, ctx: &mut JobContext) -> Result<(), FlowError> {
        self.lifecycle.before_job(ctx).await
    }

    async fn before_item(&self, ctx: &mut JobContext, raw: &JsonMap) -> Result<Arc<dyn Page>, FlowError> {
        tracing::debug!(url = ?raw.get("url"), "Preparing page");
        self.lifecycle.before_item(ctx).await
    }

    async fn after_item(&self, ctx: &mut JobContext, view: &mut ItemView) {
        self.lifecycle.after_item(ctx, view).await;
    }

    async fn after_job(&self, ctx: &mut JobContext, summary: &JobSummary) {
        self.lifecycle.after_job(ctx, summary).await;
    }

    fn validate_input(&self, raw: &JsonMap) -> Result<(), FlowError> {
        let url = raw.get("url").and_then(Value::as_str).unwrap_or_default().trim();
        if is_http_url(url) {
            Ok(())
        } else {
            Err(FlowError::invalid_input("invalid_url"))
        }
    }

    fn on_retry(&self, raw: &JsonMap, attempt: u32, error: &FlowError) {
        tracing::warn!(attempt, url = ?raw.get("url"), error = %error, "Retrying crawl");
    }

    fn on_error(&self, raw: &JsonMap, error: &FlowError) {
        tracing::error!(url = ?raw.get("url"), error = %error, "Crawl failed");
    }

    fn dedupe_key(&self, raw: &JsonMap) -> Result<String, FlowError> {
        let url = normalized_str(raw, "url");
        let raw_text = meta(raw)
            .map(|meta| normalized_str(meta, "raw_text"))
            .unwrap_or_default();
        Ok(format!("url={url}|raw={raw_text}"))
    }

    fn api_prevalidate(&self, items: &[JsonMap]) -> Vec<ValidationIssue> {
        items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                let url = item.get("url").and_then(Value::as_str).unwrap_or_default();
                if url.is_empty() {
                    Some(ValidationIssue::new(idx, "MISSING_URL", "url is required"))
                } else if !is_http_url(url) {
                    Some(ValidationIssue::new(idx, "INVALID_SCHEME", "url must start with http(s)"))
                } else {
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl FlowAdapter for CrawlSimple {
    type Input = CrawlInput;

    fn flow_type(&self) -> FlowType {
        FlowType::CrawlSimple
    }

    fn session_spec(&self) -> SessionSpec {
        SessionSpec::non_auth()
    }

    fn input_fields(&self) -> &'static [InputField] {
        FIELDS
    }

    async fn run_item(&self, input: CrawlInput, page: &dyn Page) -> ActionResult {
        let started = Instant::now();
        let result = collect(&input, page).await;

        let mut timings = Timings::new();
        timings.insert("total".into(), started.elapsed().as_secs_f64());

        match result {
            Ok(snapshot) => ActionResult::ok(snapshot).with_timings(timings),
            Err(err) => {
                tracing::warn!(url = %input.url, error = %err, "Crawl attempt failed");
                ActionResult::fail(err).with_timings(timings)
            }
        }
    }
}

async fn collect(input: &CrawlInput, page: &dyn Page) -> Result<JsonMap, FlowError> {
    let navigation = page.goto(input.url.trim()).await?;
    let title = page.title().await?;
    let meta_tags = page.meta_tags().await?;

    let snapshot = json!({
        "title": (!title.is_empty()).then_some(title),
        "final_url": navigation.url,
        "http_status": navigation.status,
        "meta_tags": meta_tags,
        "meta": input.meta,
    });
    match snapshot {
        Value::Object(map) => Ok(map),
        _ => Err(FlowError::unknown("crawl snapshot is not an object")),
    }
}
