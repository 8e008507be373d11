//! Runtime settings shared by the API, scheduler, worker and runner.
//!
//! Settings are built once at process start and passed down explicitly; no
//! component reads the environment on its own.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CoreError;

define_text_enum! {
    /// Per-item trace capture policy.
    TraceMode {
        On = "on",
        Off = "off",
        RetainOnFailure = "retain-on-failure",
    }
}

/// Runtime configuration snapshot.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_url: String,
    /// Maximum concurrently RUNNING jobs (always >= 1).
    pub executor_max_workers: u32,
    /// Extra attempts per item after the first one.
    pub item_max_retries: u32,
    pub max_items_per_job: usize,
    pub payload_max_bytes: usize,
    pub page_size_default: u32,
    pub page_size_max: u32,
    pub api_key_enabled: bool,
    pub api_key: String,
    pub tracing_mode: TraceMode,
    pub artifacts_dir: PathBuf,
    pub secrets_dir: PathBuf,
    pub nav_timeout_secs: u64,
    pub saucedemo_username: String,
    pub saucedemo_pw: String,
    /// Explicit worker executable; `None` means "next to the current binary".
    pub worker_bin: Option<PathBuf>,
    /// Interval of the API's background scheduling sweep; `0` disables it.
    pub scheduler_sweep_secs: u64,
    /// Serve Prometheus metrics at `/api/v1/metrics`.
    pub metrics_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_url: "sqlite://./var/app.db".to_string(),
            executor_max_workers: 1,
            item_max_retries: 2,
            max_items_per_job: 200,
            payload_max_bytes: 512 * 1024,
            page_size_default: 50,
            page_size_max: 500,
            api_key_enabled: false,
            api_key: "changeme".to_string(),
            tracing_mode: TraceMode::RetainOnFailure,
            artifacts_dir: PathBuf::from("./var/artifacts"),
            secrets_dir: PathBuf::from("./secrets"),
            nav_timeout_secs: 30,
            saucedemo_username: String::new(),
            saucedemo_pw: String::new(),
            worker_bin: None,
            scheduler_sweep_secs: 5,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    /// Load settings from process environment variables with defaults.
    ///
    /// | Env Var                            | Default                 |
    /// |------------------------------------|-------------------------|
    /// | `DATABASE_URL` / `AUTOSUITE_DB_URL`| `sqlite://./var/app.db` |
    /// | `AUTOSUITE_EXECUTOR_MAX_WORKERS`   | `1`                     |
    /// | `AUTOSUITE_ITEM_MAX_RETRIES`       | `2`                     |
    /// | `AUTOSUITE_MAX_ITEMS_PER_JOB`      | `200`                   |
    /// | `AUTOSUITE_PAYLOAD_MAX_BYTES`      | `524288`                |
    /// | `AUTOSUITE_PAGE_SIZE_DEFAULT`      | `50`                    |
    /// | `AUTOSUITE_PAGE_SIZE_MAX`          | `500`                   |
    /// | `AUTOSUITE_API_KEY_ENABLED`        | `false`                 |
    /// | `AUTOSUITE_API_KEY`                | `changeme`              |
    /// | `AUTOSUITE_PW_TRACING`             | `retain-on-failure`     |
    /// | `AUTOSUITE_ARTIFACTS_DIR`          | `./var/artifacts`       |
    /// | `AUTOSUITE_SECRETS_DIR`            | `./secrets`             |
    /// | `AUTOSUITE_NAV_TIMEOUT_SECS`       | `30`                    |
    /// | `AUTOSUITE_SAUCEDEMO_USERNAME`     | empty                   |
    /// | `AUTOSUITE_SAUCEDEMO_PW`           | empty                   |
    /// | `AUTOSUITE_WORKER_BIN`             | unset                   |
    /// | `AUTOSUITE_SCHEDULER_SWEEP_SECS`   | `5`                     |
    /// | `AUTOSUITE_METRICS_ENABLED`        | `true`                  |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Rebuild this snapshot from the current environment.
    ///
    /// Intended for tests that change variables between cases.
    pub fn reload(&mut self) -> Result<(), CoreError> {
        *self = Self::from_env()?;
        Ok(())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_url = get("DATABASE_URL")
            .or_else(|| get("AUTOSUITE_DB_URL"))
            .unwrap_or(defaults.db_url);

        let executor_max_workers: u32 = parse_or(
            &get,
            "AUTOSUITE_EXECUTOR_MAX_WORKERS",
            defaults.executor_max_workers,
        )?;
        if executor_max_workers == 0 {
            return Err(CoreError::Validation(
                "AUTOSUITE_EXECUTOR_MAX_WORKERS must be at least 1".into(),
            ));
        }

        let tracing_mode = match get("AUTOSUITE_PW_TRACING") {
            Some(raw) => raw.trim().to_ascii_lowercase().parse().map_err(|_| {
                CoreError::Validation(format!(
                    "AUTOSUITE_PW_TRACING must be one of on/off/retain-on-failure, got '{raw}'"
                ))
            })?,
            None => defaults.tracing_mode,
        };

        Ok(Self {
            db_url,
            executor_max_workers,
            item_max_retries: parse_or(&get, "AUTOSUITE_ITEM_MAX_RETRIES", defaults.item_max_retries)?,
            max_items_per_job: parse_or(
                &get,
                "AUTOSUITE_MAX_ITEMS_PER_JOB",
                defaults.max_items_per_job,
            )?,
            payload_max_bytes: parse_or(
                &get,
                "AUTOSUITE_PAYLOAD_MAX_BYTES",
                defaults.payload_max_bytes,
            )?,
            page_size_default: parse_or(
                &get,
                "AUTOSUITE_PAGE_SIZE_DEFAULT",
                defaults.page_size_default,
            )?,
            page_size_max: parse_or(&get, "AUTOSUITE_PAGE_SIZE_MAX", defaults.page_size_max)?,
            api_key_enabled: match get("AUTOSUITE_API_KEY_ENABLED") {
                Some(raw) => parse_bool("AUTOSUITE_API_KEY_ENABLED", &raw)?,
                None => defaults.api_key_enabled,
            },
            api_key: get("AUTOSUITE_API_KEY").unwrap_or(defaults.api_key),
            tracing_mode,
            artifacts_dir: get("AUTOSUITE_ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifacts_dir),
            secrets_dir: get("AUTOSUITE_SECRETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.secrets_dir),
            nav_timeout_secs: parse_or(&get, "AUTOSUITE_NAV_TIMEOUT_SECS", defaults.nav_timeout_secs)?,
            saucedemo_username: get("AUTOSUITE_SAUCEDEMO_USERNAME").unwrap_or_default(),
            saucedemo_pw: get("AUTOSUITE_SAUCEDEMO_PW").unwrap_or_default(),
            worker_bin: get("AUTOSUITE_WORKER_BIN").map(PathBuf::from),
            scheduler_sweep_secs: parse_or(
                &get,
                "AUTOSUITE_SCHEDULER_SWEEP_SECS",
                defaults.scheduler_sweep_secs,
            )?,
            metrics_enabled: match get("AUTOSUITE_METRICS_ENABLED") {
                Some(raw) => parse_bool("AUTOSUITE_METRICS_ENABLED", &raw)?,
                None => defaults.metrics_enabled,
            },
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::Validation(format!("{key} is invalid ('{raw}'): {e}"))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, CoreError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoreError::Validation(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}
