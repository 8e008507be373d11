//! `FLOW_SAUCE_DEMO`: log in to the Sauce Demo storefront, buy the
//! requested products, and report the totals shown at checkout.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use async_trait::async_trait;
use autosuite_core::error_code::FlowError;
use autosuite_core::flow::{ContextPer, FlowType, SessionMode};
use autosuite_core::result::{ActionResult, JobSummary};
use autosuite_core::settings::Settings;
use autosuite_core::types::{JsonMap, Timings};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::context::JobContext;
use crate::hooks::{FlowAdapter, FlowHooks, ItemView, ValidationIssue};
use crate::input::{normalized_str, InputField};
use crate::session::lifecycle::SessionLifecycle;
use crate::session::secrets::SecretStore;
use crate::session::{Page, SessionProvider, SessionSpec};

pub mod pages;

use pages::{LoginPage, Totals};

/// Form-auth secret holding `username` / `password`.
pub const SECRET_NAME: &str = "sauce_demo";

const MAX_PRODUCTS: usize = 10;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\s\-.']{1,50}$").expect("valid regex"));
static POSTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-\s]{3,12}$").expect("valid regex"));

static FIELDS: &[InputField] = &[
    InputField::required("first_name", "Customer first name"),
    InputField::required("last_name", "Customer last name"),
    InputField::required("postal_code", "Customer postal code"),
    InputField::required("product_names", "Visible product names to add"),
    InputField::optional("meta", "Raw input"),
];

const PRODUCT_SUGGESTIONS: &[&str] = &[
    "Sauce Labs Backpack",
    "Sauce Labs Bike Light",
    "Sauce Labs Bolt T-Shirt",
    "Sauce Labs Fleece Jacket",
    "Sauce Labs Onesie",
    "Test.allTheThings() T-Shirt (Red)",
];

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutInput {
    #[validate(regex(path = *NAME_RE))]
    pub first_name: String,
    #[validate(regex(path = *NAME_RE))]
    pub last_name: String,
    #[validate(regex(path = *POSTAL_RE))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 10))]
    pub product_names: Vec<String>,
    #[serde(default)]
    pub meta: JsonMap,
}

pub struct SauceDemo {
    lifecycle: SessionLifecycle,
}

impl SauceDemo {
    pub fn new(settings: Arc<Settings>, sessions: Arc<dyn SessionProvider>) -> Self {
        Self {
            lifecycle: SessionLifecycle::new(settings, sessions),
        }
    }

    /// Storefront credentials: settings first, then the form-auth secret.
    fn credentials(&self) -> Result<(String, String), FlowError> {
        let settings = self.lifecycle.settings();
        if !settings.saucedemo_username.is_empty() {
            return Ok((
                settings.saucedemo_username.clone(),
                settings.saucedemo_pw.clone(),
            ));
        }

        let creds = SecretStore::new(&settings.secrets_dir).form_auth(&[SECRET_NAME.to_string()])?;
        let field = |key: &str| {
            creds
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok((field("username"), field("password")))
    }

    async fn checkout(
        &self,
        input: &CheckoutInput,
        page: &dyn Page,
        asserted: &mut JsonMap,
    ) -> Result<Totals, FlowError> {
        let (username, password) = self.credentials()?;

        let inventory = LoginPage::new(page)
            .open()
            .await?
            .login(&username, &password)
            .await?;
        asserted.insert("inventory".into(), true.into());

        let cart = inventory
            .add_products_by_name(&input.product_names)
            .await?
            .go_to_cart()
            .await?
            .assert_contains(&input.product_names)
            .await?;
        asserted.insert("cart".into(), true.into());

        let step_one = cart.checkout().await?;
        asserted.insert("step_one".into(), true.into());

        let step_two = step_one
            .fill_and_continue(&input.first_name, &input.last_name, &input.postal_code)
            .await?
            .assert_contains(&input.product_names)
            .await?;
        let totals = step_two.read_totals().await?;
        asserted.insert("step_two".into(), true.into());

        step_two.finish().await?.assert_success().await?;
        asserted.insert("complete".into(), true.into());

        Ok(totals)
    }
}

fn str_field<'a>(raw: &'a JsonMap, key: &str) -> &'a str {
    raw.get(key).and_then(Value::as_str).unwrap_or_default().trim()
}

#[async_trait]
impl FlowHooks for SauceDemo {
    async fn before_job(&self, ctx: &mut JobContext) -> Result<(), FlowError> {
        self.lifecycle.before_job(ctx).await
    }

    async fn before_item(&self, ctx: &mut JobContext, _raw: &JsonMap) -> Result<Arc<dyn Page>, FlowError> {
        self.lifecycle.before_item(ctx).await
    }

    async fn after_item(&self, ctx: &mut JobContext, view: &mut ItemView) {
        self.lifecycle.after_item(ctx, view).await;
    }

    async fn after_job(&self, ctx: &mut JobContext, summary: &JobSummary) {
        self.lifecycle.after_job(ctx, summary).await;
    }

    fn validate_input(&self, raw: &JsonMap) -> Result<(), FlowError> {
        let first = str_field(raw, "first_name");
        let last = str_field(raw, "last_name");
        if !(NAME_RE.is_match(first) && NAME_RE.is_match(last)) {
            return Err(FlowError::invalid_input("invalid_name"));
        }
        if !POSTAL_RE.is_match(str_field(raw, "postal_code")) {
            return Err(FlowError::invalid_input("invalid_postal_code"));
        }
        match raw.get("product_names").and_then(Value::as_array) {
            Some(names) if names.len() > MAX_PRODUCTS => {
                Err(FlowError::invalid_input("too_many_products"))
            }
            Some(names) if !names.is_empty() => Ok(()),
            _ => Err(FlowError::invalid_input("invalid_product_names")),
        }
    }

    fn dedupe_key(&self, raw: &JsonMap) -> Result<String, FlowError> {
        let mut names: Vec<String> = raw
            .get("product_names")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .map(|n| n.as_str().unwrap_or_default().trim().to_lowercase())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();

        Ok(format!(
            "fn={}|ln={}|pc={}|names={}",
            normalized_str(raw, "first_name"),
            normalized_str(raw, "last_name"),
            normalized_str(raw, "postal_code"),
            names.join("|"),
        ))
    }

    fn api_prevalidate(&self, items: &[JsonMap]) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            let missing = ["first_name", "last_name", "postal_code"]
                .iter()
                .any(|key| str_field(item, key).is_empty());
            if missing {
                issues.push(ValidationIssue::new(
                    idx,
                    "MISSING_REQUIRED",
                    "first/last/postal required",
                ));
            }
            let has_products = item
                .get("product_names")
                .and_then(Value::as_array)
                .is_some_and(|names| !names.is_empty());
            if !has_products {
                issues.push(ValidationIssue::new(
                    idx,
                    "NO_PRODUCTS",
                    "product_names must have at least 1 entry",
                ));
            }
        }
        issues
    }
}

#[async_trait]
impl FlowAdapter for SauceDemo {
    type Input = CheckoutInput;

    fn flow_type(&self) -> FlowType {
        FlowType::SauceDemo
    }

    fn session_spec(&self) -> SessionSpec {
        SessionSpec {
            mode: SessionMode::FormAuth,
            secret_names: vec![SECRET_NAME.to_string()],
            context_per: ContextPer::Job,
            page_reuse: false,
        }
    }

    fn input_fields(&self) -> &'static [InputField] {
        FIELDS
    }

    fn field_options(&self) -> BTreeMap<&'static str, Vec<&'static str>> {
        BTreeMap::from([("product_names", PRODUCT_SUGGESTIONS.to_vec())])
    }

    async fn run_item(&self, input: CheckoutInput, page: &dyn Page) -> ActionResult {
        let started = Instant::now();
        let mut asserted = JsonMap::new();
        let result = self.checkout(&input, page, &mut asserted).await;

        let mut timings = Timings::new();
        timings.insert("total".into(), started.elapsed().as_secs_f64());
        let mut extras = JsonMap::new();
        extras.insert("asserted".into(), Value::Object(asserted));

        match result {
            Ok(totals) => {
                let output = json!({
                    "totals": totals,
                    "selected_products": input.product_names,
                    "customer": {
                        "first_name": input.first_name,
                        "last_name": input.last_name,
                        "postal_code": input.postal_code,
                    },
                });
                let Value::Object(output) = output else {
                    return ActionResult::fail(FlowError::unknown("checkout output is not an object"));
                };
                ActionResult::ok(output).with_timings(timings).with_extras(extras)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Sauce demo checkout failed");
                ActionResult::fail(err).with_timings(timings).with_extras(extras)
            }
        }
    }
}
