//! Sequential job runner.
//!
//! Validates, deduplicates and executes a batch of raw item payloads
//! against one registered flow, returning exactly one [`ItemResult`] per
//! input item, in input order. Item failures never escape: they are
//! recorded as FAILED results and the batch carries on.

use std::collections::HashSet;
use std::sync::Arc;

use autosuite_core::error::CoreError;
use autosuite_core::error_code::FlowError;
use autosuite_core::flow::FlowType;
use autosuite_core::result::{ActionResult, ItemResult, JobSummary};
use autosuite_core::types::JsonMap;
use serde_json::Value;

use crate::context::JobContext;
use crate::events::{EventBus, RunEvent};
use crate::hooks::{fallback_dedupe_key, ItemView, RegisteredFlow};
use crate::registry::FlowRegistry;
use crate::session::Page;

/// Runs jobs against the flows of a [`FlowRegistry`].
pub struct FlowRunner {
    registry: Arc<FlowRegistry>,
    item_max_retries: u32,
    events: EventBus,
}

impl FlowRunner {
    pub fn new(registry: Arc<FlowRegistry>, item_max_retries: u32) -> Self {
        Self {
            registry,
            item_max_retries,
            events: EventBus::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run every item of a job through `flow`.
    ///
    /// `options.job_id` labels events and traces; `options.dedupe` (default
    /// `true`) toggles in-batch deduplication. The only error is an
    /// unregistered flow, reported before any hook runs.
    pub async fn run_job(
        &self,
        flow: FlowType,
        items: &[JsonMap],
        options: &JsonMap,
    ) -> Result<Vec<ItemResult>, CoreError> {
        let adapter = self.registry.get(flow)?;
        let descriptor = adapter.descriptor();

        let job_id = options
            .get("job_id")
            .and_then(Value::as_str)
            .unwrap_or("n/a")
            .to_string();
        let dedupe = options
            .get("dedupe")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        tracing::info!(job_id = %job_id, flow = %flow, items = items.len(), dedupe, "Running job");
        self.events.publish(RunEvent::JobStarted {
            job_id: job_id.clone(),
            flow,
        });

        let mut ctx = JobContext::new(job_id.clone(), flow, options.clone(), descriptor.session);

        let results = match adapter.before_job(&mut ctx).await {
            Ok(()) => self.run_items(adapter.as_ref(), &mut ctx, items, dedupe).await,
            Err(err) => {
                tracing::error!(job_id = %job_id, error = %err, "before_job failed, failing all items");
                items.iter().map(|_| ItemResult::failed(&err, 0)).collect()
            }
        };

        let summary = JobSummary::from_results(&results);
        adapter.after_job(&mut ctx, &summary).await;

        let status = summary.job_status();
        tracing::info!(
            job_id = %job_id,
            done = summary.done,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Job run complete",
        );
        self.events.publish(RunEvent::JobFinished {
            job_id,
            flow,
            status,
        });

        Ok(results)
    }

    async fn run_items(
        &self,
        flow: &dyn RegisteredFlow,
        ctx: &mut JobContext,
        items: &[JsonMap],
        dedupe: bool,
    ) -> Vec<ItemResult> {
        let mut results = Vec::with_capacity(items.len());
        let mut seen = HashSet::new();

        for (idx, raw) in items.iter().enumerate() {
            ctx.item_idx = idx;

            let result = if let Err(err) = flow.validate_input(raw) {
                tracing::info!(job_id = %ctx.job_id, idx, error = %err, "Item failed validation");
                ItemResult::failed(&err, 0)
            } else if dedupe && is_duplicate(flow, raw, &mut seen) {
                tracing::info!(job_id = %ctx.job_id, idx, "Item deduplicated");
                ItemResult::deduped()
            } else {
                self.events.publish(RunEvent::ItemStarted {
                    job_id: ctx.job_id.clone(),
                    idx,
                });
                self.attempt(flow, ctx, raw).await
            };

            let result = finish_item(flow, ctx, idx, result).await;
            self.events.publish(RunEvent::ItemFinished {
                job_id: ctx.job_id.clone(),
                idx,
                status: result.status,
            });
            results.push(result);
        }

        results
    }

    /// Execute one item with `1 + item_max_retries` attempts.
    ///
    /// A page that `before_item` handed out is kept for later attempts;
    /// a failing `before_item` counts as a raised error for that attempt.
    async fn attempt(
        &self,
        flow: &dyn RegisteredFlow,
        ctx: &mut JobContext,
        raw: &JsonMap,
    ) -> ItemResult {
        let attempts = self.item_max_retries.saturating_add(1);
        let mut page: Option<Arc<dyn Page>> = None;
        let mut attempt = 0;

        loop {
            let last = attempt + 1 >= attempts;

            let outcome = match page.clone() {
                Some(ready) => flow.run_raw(raw, ready.as_ref()).await,
                None => match flow.before_item(ctx, raw).await {
                    Ok(ready) => {
                        page = Some(ready.clone());
                        flow.run_raw(raw, ready.as_ref()).await
                    }
                    Err(err) => Err(err),
                },
            };

            match outcome {
                Ok(ActionResult {
                    outcome: Ok(output),
                    timings,
                    extras,
                }) => return ItemResult::done(output, attempt, timings, extras),
                Ok(ActionResult {
                    outcome: Err(err),
                    timings,
                    extras,
                }) => {
                    if last {
                        return ItemResult::failed(&err, attempt)
                            .with_timings(timings)
                            .with_extras(extras);
                    }
                    flow.on_retry(raw, attempt + 1, &err);
                }
                Err(err) => {
                    if last {
                        flow.on_error(raw, &err);
                        return ItemResult::failed(&err, attempt);
                    }
                    flow.on_retry(raw, attempt + 1, &err);
                }
            }

            attempt += 1;
        }
    }
}

/// Record the item's dedupe key; `true` when it was already seen.
fn is_duplicate(flow: &dyn RegisteredFlow, raw: &JsonMap, seen: &mut HashSet<String>) -> bool {
    let key = flow.dedupe_key(raw).unwrap_or_else(|err: FlowError| {
        tracing::debug!(error = %err, "dedupe_key hook failed, using fallback key");
        fallback_dedupe_key(raw)
    });
    !key.is_empty() && !seen.insert(key)
}

/// Give `after_item` its view of the result and merge its edits back.
async fn finish_item(
    flow: &dyn RegisteredFlow,
    ctx: &mut JobContext,
    idx: usize,
    mut result: ItemResult,
) -> ItemResult {
    let mut view = ItemView {
        idx,
        status: result.status,
        timings: std::mem::take(&mut result.timings),
        extras: std::mem::take(&mut result.extras),
    };
    flow.after_item(ctx, &mut view).await;
    result.timings = view.timings;
    result.extras = view.extras;
    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use autosuite_core::error_code::ErrorCode;
    use autosuite_core::status::{ItemStatus, JobStatus};
    use autosuite_core::types::Timings;
    use serde::Deserialize;
    use serde_json::json;
    use validator::Validate;

    use super::*;
    use crate::hooks::{FlowAdapter, FlowHooks};
    use crate::input::InputField;
    use crate::session::SessionSpec;
    use crate::testing::NullPage;

    #[derive(Debug, Clone, Copy)]
    enum Mode {
        Ok,
        SoftFail,
        FailFirstAttempt,
        NoPage,
    }

    #[derive(Deserialize, Validate)]
    struct ScriptedInput {
        url: String,
        #[validate(range(max = 3))]
        depth: Option<u32>,
    }

    #[derive(Debug, Clone, Copy)]
    enum DedupeHook {
        Default,
        Empty,
        Fails,
    }

    /// Scripted flow that records every hook call.
    struct Scripted {
        mode: Mode,
        dedupe_hook: DedupeHook,
        fail_before_job: bool,
        runs: Mutex<Vec<String>>,
        retries: AtomicU32,
        errors: AtomicU32,
        after_job: Mutex<Option<JobSummary>>,
    }

    impl Scripted {
        fn new(mode: Mode) -> Self {
            Self {
                mode,
                dedupe_hook: DedupeHook::Default,
                fail_before_job: false,
                runs: Mutex::new(Vec::new()),
                retries: AtomicU32::new(0),
                errors: AtomicU32::new(0),
                after_job: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl FlowHooks for Arc<Scripted> {
        async fn before_job(&self, _ctx: &mut JobContext) -> Result<(), FlowError> {
            if self.fail_before_job {
                return Err(FlowError::navigation("browser did not start"));
            }
            Ok(())
        }

        async fn before_item(
            &self,
            _ctx: &mut JobContext,
            _raw: &JsonMap,
        ) -> Result<Arc<dyn Page>, FlowError> {
            match self.mode {
                Mode::NoPage => Err(FlowError::timeout("page never became ready")),
                _ => Ok(Arc::new(NullPage)),
            }
        }

        async fn after_item(&self, _ctx: &mut JobContext, view: &mut ItemView) {
            view.extras.insert("after_item_idx".into(), json!(view.idx));
            view.timings.insert("after_item".into(), 0.25);
        }

        async fn after_job(&self, _ctx: &mut JobContext, summary: &JobSummary) {
            *self.after_job.lock().unwrap() = Some(*summary);
        }

        fn validate_input(&self, raw: &JsonMap) -> Result<(), FlowError> {
            let url = raw.get("url").and_then(Value::as_str).unwrap_or_default();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(())
            } else {
                Err(FlowError::invalid_input("invalid_url"))
            }
        }

        fn on_retry(&self, _raw: &JsonMap, _attempt: u32, _error: &FlowError) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _raw: &JsonMap, _error: &FlowError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn dedupe_key(&self, raw: &JsonMap) -> Result<String, FlowError> {
            match self.dedupe_hook {
                DedupeHook::Default => Ok(fallback_dedupe_key(raw)),
                DedupeHook::Empty => Ok(String::new()),
                DedupeHook::Fails => Err(FlowError::unknown("key source unavailable")),
            }
        }
    }

    #[async_trait]
    impl FlowAdapter for Arc<Scripted> {
        type Input = ScriptedInput;

        fn flow_type(&self) -> FlowType {
            FlowType::CrawlSimple
        }

        fn session_spec(&self) -> SessionSpec {
            SessionSpec::non_auth()
        }

        fn input_fields(&self) -> &'static [InputField] {
            const FIELDS: &[InputField] = &[
                InputField::required("url", "Target URL"),
                InputField::optional("depth", "Crawl depth"),
            ];
            FIELDS
        }

        async fn run_item(&self, input: ScriptedInput, _page: &dyn Page) -> ActionResult {
            let attempt = {
                let mut runs = self.runs.lock().unwrap();
                runs.push(input.url.clone());
                runs.len()
            };
            let timings = Timings::from([("total".to_string(), 0.5)]);
            let fail = match self.mode {
                Mode::SoftFail => true,
                Mode::FailFirstAttempt => attempt == 1,
                Mode::Ok | Mode::NoPage => false,
            };
            if fail {
                return ActionResult::fail(FlowError::navigation("net::ERR_NAME_NOT_RESOLVED"))
                    .with_timings(timings);
            }
            let mut out = JsonMap::new();
            out.insert("final_url".into(), json!(input.url));
            ActionResult::ok(out).with_timings(timings)
        }
    }

    fn runner_for(flow_impl: &Arc<Scripted>, retries: u32) -> FlowRunner {
        let mut registry = FlowRegistry::new();
        registry.register(flow_impl.clone());
        FlowRunner::new(Arc::new(registry), retries)
    }

    fn items(urls: &[&str]) -> Vec<JsonMap> {
        urls.iter()
            .map(|u| json!({ "url": u }).as_object().cloned().unwrap())
            .collect()
    }

    fn options(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    // -----------------------------------------------------------------------
    // Dedupe
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn duplicate_items_run_once() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 0);

        let results = runner
            .run_job(
                FlowType::CrawlSimple,
                &items(&["https://a.test", "https://a.test", "https://b.test"]),
                &JsonMap::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            *flow_impl.runs.lock().unwrap(),
            vec!["https://a.test", "https://b.test"]
        );
        assert_eq!(results[0].status, ItemStatus::Done);
        assert_eq!(results[1].status, ItemStatus::Cancelled);
        assert_eq!(results[1].error_code, ErrorCode::Deduped);
        assert_eq!(results[2].status, ItemStatus::Done);
    }

    #[tokio::test]
    async fn empty_dedupe_keys_never_collide() {
        let mut flow_impl = Scripted::new(Mode::Ok);
        flow_impl.dedupe_hook = DedupeHook::Empty;
        let flow_impl = Arc::new(flow_impl);
        let runner = runner_for(&flow_impl, 0);

        let results = runner
            .run_job(
                FlowType::CrawlSimple,
                &items(&["https://a.test", "https://a.test"]),
                &JsonMap::new(),
            )
            .await
            .unwrap();

        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![ItemStatus::Done, ItemStatus::Done]);
        assert_eq!(flow_impl.runs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_dedupe_hook_uses_the_fallback_key() {
        let mut flow_impl = Scripted::new(Mode::Ok);
        flow_impl.dedupe_hook = DedupeHook::Fails;
        let flow_impl = Arc::new(flow_impl);
        let runner = runner_for(&flow_impl, 0);

        let results = runner
            .run_job(
                FlowType::CrawlSimple,
                &items(&["https://a.test", "https://A.test ", "https://b.test"]),
                &JsonMap::new(),
            )
            .await
            .unwrap();

        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![ItemStatus::Done, ItemStatus::Cancelled, ItemStatus::Done]
        );
        assert_eq!(results[1].error_code, ErrorCode::Deduped);
        assert_eq!(flow_impl.runs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dedupe_can_be_switched_off() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 0);

        let results = runner
            .run_job(
                FlowType::CrawlSimple,
                &items(&["https://a.test", "https://a.test"]),
                &options(json!({ "dedupe": false })),
            )
            .await
            .unwrap();

        assert_eq!(flow_impl.runs.lock().unwrap().len(), 2);
        assert!(results.iter().all(|r| r.status == ItemStatus::Done));
    }

    // -----------------------------------------------------------------------
    // Retries
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn soft_failures_exhaust_the_retry_budget() {
        let flow_impl = Arc::new(Scripted::new(Mode::SoftFail));
        let runner = runner_for(&flow_impl, 1);

        let results = runner
            .run_job(FlowType::CrawlSimple, &items(&["https://a.test"]), &JsonMap::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let item = &results[0];
        assert_eq!(item.status, ItemStatus::Failed);
        assert_eq!(item.retry_count, 1);
        assert_eq!(item.error_code, ErrorCode::NavigationError);
        assert_eq!(item.timings.get("total"), Some(&0.5));
        assert_eq!(flow_impl.retries.load(Ordering::SeqCst), 1);
        assert_eq!(flow_impl.errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_after_retry_reports_attempts_used() {
        let flow_impl = Arc::new(Scripted::new(Mode::FailFirstAttempt));
        let runner = runner_for(&flow_impl, 2);

        let results = runner
            .run_job(FlowType::CrawlSimple, &items(&["https://a.test"]), &JsonMap::new())
            .await
            .unwrap();

        assert_eq!(results[0].status, ItemStatus::Done);
        assert_eq!(results[0].retry_count, 1);
        assert_eq!(flow_impl.runs.lock().unwrap().len(), 2);
        assert_eq!(flow_impl.retries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn raised_errors_go_through_on_error() {
        let flow_impl = Arc::new(Scripted::new(Mode::NoPage));
        let runner = runner_for(&flow_impl, 2);

        let results = runner
            .run_job(FlowType::CrawlSimple, &items(&["https://a.test"]), &JsonMap::new())
            .await
            .unwrap();

        assert_eq!(results[0].status, ItemStatus::Failed);
        assert_eq!(results[0].error_code, ErrorCode::Timeout);
        assert_eq!(results[0].retry_count, 2);
        assert_eq!(flow_impl.retries.load(Ordering::SeqCst), 2);
        assert_eq!(flow_impl.errors.load(Ordering::SeqCst), 1);
        assert!(flow_impl.runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_violations_are_invalid_input() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 0);
        let raw = vec![json!({ "url": "https://a.test", "depth": 9 })
            .as_object()
            .cloned()
            .unwrap()];

        let results = runner
            .run_job(FlowType::CrawlSimple, &raw, &JsonMap::new())
            .await
            .unwrap();

        assert_eq!(results[0].error_code, ErrorCode::InvalidInput);
        assert!(results[0]
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("schema_error"));
        assert!(flow_impl.runs.lock().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Validation, ordering and hooks
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn invalid_item_fails_without_running() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 2);

        let results = runner
            .run_job(FlowType::CrawlSimple, &items(&["notaurl"]), &JsonMap::new())
            .await
            .unwrap();

        assert_eq!(results[0].status, ItemStatus::Failed);
        assert_eq!(results[0].error_code, ErrorCode::InvalidInput);
        assert_eq!(results[0].error_message.as_deref(), Some("invalid_url"));
        assert!(flow_impl.runs.lock().unwrap().is_empty());
        assert_eq!(
            JobSummary::from_results(&results).job_status(),
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 0);
        let input = items(&["https://c.test", "bad", "https://a.test", "https://c.test"]);

        let results = runner
            .run_job(FlowType::CrawlSimple, &input, &JsonMap::new())
            .await
            .unwrap();

        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                ItemStatus::Done,
                ItemStatus::Failed,
                ItemStatus::Done,
                ItemStatus::Cancelled
            ]
        );
        assert_eq!(results[2].output["final_url"], "https://a.test");
        for (idx, result) in results.iter().enumerate() {
            assert_eq!(result.extras["after_item_idx"], json!(idx));
        }
    }

    #[tokio::test]
    async fn after_item_edits_are_merged() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 0);

        let results = runner
            .run_job(FlowType::CrawlSimple, &items(&["https://a.test"]), &JsonMap::new())
            .await
            .unwrap();

        assert_eq!(results[0].timings.get("total"), Some(&0.5));
        assert_eq!(results[0].timings.get("after_item"), Some(&0.25));
        assert_eq!(results[0].extras["after_item_idx"], json!(0));
    }

    #[tokio::test]
    async fn empty_job_still_calls_after_job() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 0);

        let results = runner
            .run_job(FlowType::CrawlSimple, &[], &JsonMap::new())
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(*flow_impl.after_job.lock().unwrap(), Some(JobSummary::default()));
    }

    #[tokio::test]
    async fn before_job_failure_fails_every_item() {
        let mut flow_impl = Scripted::new(Mode::Ok);
        flow_impl.fail_before_job = true;
        let flow_impl = Arc::new(flow_impl);
        let runner = runner_for(&flow_impl, 0);

        let results = runner
            .run_job(
                FlowType::CrawlSimple,
                &items(&["https://a.test", "https://b.test"]),
                &JsonMap::new(),
            )
            .await
            .unwrap();

        assert!(results
            .iter()
            .all(|r| r.status == ItemStatus::Failed && r.error_code == ErrorCode::NavigationError));
        assert!(flow_impl.runs.lock().unwrap().is_empty());
        let summary = flow_impl.after_job.lock().unwrap().unwrap();
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn unregistered_flow_is_rejected() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 0);

        let err = runner
            .run_job(FlowType::SauceDemo, &items(&["https://a.test"]), &JsonMap::new())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::UnsupportedFlow(_));
    }

    #[tokio::test]
    async fn events_bracket_the_run() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 0);
        let mut rx = runner.events().subscribe();

        runner
            .run_job(
                FlowType::CrawlSimple,
                &items(&["https://a.test"]),
                &options(json!({ "job_id": "job-7" })),
            )
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                RunEvent::JobStarted {
                    job_id: "job-7".into(),
                    flow: FlowType::CrawlSimple
                },
                RunEvent::ItemStarted {
                    job_id: "job-7".into(),
                    idx: 0
                },
                RunEvent::ItemFinished {
                    job_id: "job-7".into(),
                    idx: 0,
                    status: ItemStatus::Done
                },
                RunEvent::JobFinished {
                    job_id: "job-7".into(),
                    flow: FlowType::CrawlSimple,
                    status: JobStatus::Done
                },
            ]
        );
    }

    #[tokio::test]
    async fn skipped_items_emit_no_item_started() {
        let flow_impl = Arc::new(Scripted::new(Mode::Ok));
        let runner = runner_for(&flow_impl, 0);
        let mut rx = runner.events().subscribe();

        runner
            .run_job(
                FlowType::CrawlSimple,
                &items(&["https://a.test", "bad", "https://a.test"]),
                &options(json!({ "job_id": "job-8" })),
            )
            .await
            .unwrap();

        let mut started = Vec::new();
        let mut finished = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                RunEvent::ItemStarted { idx, .. } => started.push(idx),
                RunEvent::ItemFinished { idx, .. } => finished.push(idx),
                _ => {}
            }
        }
        assert_eq!(started, vec![0]);
        assert_eq!(finished, vec![0, 1, 2]);
    }
}
