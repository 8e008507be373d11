//! The contract every automation flow implements.
//!
//! [`FlowHooks`] are the lifecycle callbacks the runner invokes around each
//! item. [`FlowAdapter`] adds the typed input and the `run_item` step.
//! [`RegisteredFlow`] is the object-safe view of an adapter that the
//! registry stores; it is implemented for every adapter automatically.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use autosuite_core::error_code::FlowError;
use autosuite_core::flow::FlowType;
use autosuite_core::result::{ActionResult, JobSummary};
use autosuite_core::status::ItemStatus;
use autosuite_core::types::{JsonMap, Timings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use validator::Validate;

use crate::context::JobContext;
use crate::input::{display_value, filter_declared, meta, normalized_str, InputField};
use crate::session::{Page, SessionSpec};

/// A problem found by a flow's cheap submit-time check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub idx: usize,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(idx: usize, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            idx,
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The slice of a finished item that `after_item` may inspect and amend.
///
/// Changes to `timings` and `extras` are merged back into the stored result.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub idx: usize,
    pub status: ItemStatus,
    pub timings: Timings,
    pub extras: JsonMap,
}

/// Lifecycle callbacks invoked by the runner.
///
/// Only `before_item` is mandatory; everything else defaults to a no-op (or
/// to the generic dedupe key).
#[async_trait]
pub trait FlowHooks: Send + Sync {
    /// Prepare job-level resources, typically a session.
    async fn before_job(&self, _ctx: &mut JobContext) -> Result<(), FlowError> {
        Ok(())
    }

    /// Hand out the page the next attempt runs on.
    async fn before_item(
        &self,
        ctx: &mut JobContext,
        raw: &JsonMap,
    ) -> Result<Arc<dyn Page>, FlowError>;

    async fn after_item(&self, _ctx: &mut JobContext, _view: &mut ItemView) {}

    /// Called exactly once per job, after the last item.
    async fn after_job(&self, _ctx: &mut JobContext, _summary: &JobSummary) {}

    /// Strict runner-side check. A failure fails the item without running it.
    fn validate_input(&self, _raw: &JsonMap) -> Result<(), FlowError> {
        Ok(())
    }

    fn on_retry(&self, _raw: &JsonMap, attempt: u32, error: &FlowError) {
        tracing::warn!(attempt, error = %error, "Retrying item");
    }

    fn on_error(&self, _raw: &JsonMap, error: &FlowError) {
        tracing::error!(error = %error, "Item failed after all attempts");
    }

    /// Key identifying equivalent items within one batch; empty disables
    /// dedupe for the item. An error falls back to [`fallback_dedupe_key`].
    fn dedupe_key(&self, raw: &JsonMap) -> Result<String, FlowError> {
        Ok(fallback_dedupe_key(raw))
    }

    /// Cheap submit-time validation run by the API before anything is stored.
    fn api_prevalidate(&self, _items: &[JsonMap]) -> Vec<ValidationIssue> {
        Vec::new()
    }
}

/// A concrete flow: typed input, declared session needs, and the item step.
#[async_trait]
pub trait FlowAdapter: FlowHooks {
    /// Typed item input, built from the declared keys of the raw payload.
    type Input: DeserializeOwned + Validate + Send + 'static;

    fn flow_type(&self) -> FlowType;

    fn session_spec(&self) -> SessionSpec;

    fn input_fields(&self) -> &'static [InputField];

    /// Suggested values per field, for tooling.
    fn field_options(&self) -> BTreeMap<&'static str, Vec<&'static str>> {
        BTreeMap::new()
    }

    /// Execute one item. Expected failures are returned, not raised.
    async fn run_item(&self, input: Self::Input, page: &dyn Page) -> ActionResult;
}

/// Static description of a registered flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowDescriptor {
    pub flow_type: FlowType,
    pub slug: &'static str,
    pub session: SessionSpec,
    pub fields: &'static [InputField],
    pub field_options: BTreeMap<&'static str, Vec<&'static str>>,
}

/// Object-safe flow handle stored in the registry.
#[async_trait]
pub trait RegisteredFlow: FlowHooks {
    fn descriptor(&self) -> FlowDescriptor;

    /// Materialize the typed input from `raw` and run the item.
    ///
    /// Schema errors (missing or mistyped declared keys, failed field
    /// constraints) are raised as `INVALID_INPUT`.
    async fn run_raw(&self, raw: &JsonMap, page: &dyn Page) -> Result<ActionResult, FlowError>;
}

#[async_trait]
impl<A> RegisteredFlow for A
where
    A: FlowAdapter,
{
    fn descriptor(&self) -> FlowDescriptor {
        let flow_type = self.flow_type();
        FlowDescriptor {
            flow_type,
            slug: flow_type.slug(),
            session: self.session_spec(),
            fields: self.input_fields(),
            field_options: self.field_options(),
        }
    }

    async fn run_raw(&self, raw: &JsonMap, page: &dyn Page) -> Result<ActionResult, FlowError> {
        let payload = filter_declared(raw, self.input_fields());
        let input: A::Input = serde_json::from_value(Value::Object(payload))?;
        input
            .validate()
            .map_err(|e| FlowError::invalid_input(format!("schema_error: {e}")))?;
        Ok(self.run_item(input, page).await)
    }
}

/// Generic dedupe key: normalized `url` plus sorted `meta` pairs.
///
/// Deterministic for equal payloads; empty when the payload has neither.
pub fn fallback_dedupe_key(raw: &JsonMap) -> String {
    let url = normalized_str(raw, "url");
    let mut pairs: Vec<String> = meta(raw)
        .map(|meta| {
            meta.iter()
                .map(|(key, value)| format!("{key}={}", display_value(value)))
                .collect()
        })
        .unwrap_or_default();
    pairs.sort();

    if url.is_empty() && pairs.is_empty() {
        return String::new();
    }

    std::iter::once(url)
        .chain(pairs)
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn fallback_key_normalizes_url() {
        let a = map(json!({ "url": "  HTTPS://A.test " }));
        let b = map(json!({ "url": "https://a.test" }));
        assert_eq!(fallback_dedupe_key(&a), fallback_dedupe_key(&b));
    }

    #[test]
    fn fallback_key_includes_sorted_meta() {
        let raw = map(json!({ "url": "https://a.test", "meta": { "b": 2, "a": "x" } }));
        assert_eq!(fallback_dedupe_key(&raw), "https://a.test|a=x|b=2");
    }

    #[test]
    fn fallback_key_is_empty_without_url_or_meta() {
        assert_eq!(fallback_dedupe_key(&map(json!({ "other": 1 }))), "");
    }
}
