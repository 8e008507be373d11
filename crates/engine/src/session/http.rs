//! HTTP session driver.
//!
//! Pages are plain HTTP fetches through a shared `reqwest` client with a
//! cookie store: navigation follows redirects and the fetched document is
//! inspected for its title and meta tags. Interactive actions (typing,
//! clicking) are not available; flows that need them fail with
//! `NAVIGATION_ERROR`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use autosuite_core::error_code::FlowError;
use autosuite_core::flow::SessionMode;
use autosuite_core::settings::Settings;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::redirect::Policy;
use serde::Serialize;
use tokio::sync::Mutex;

use super::secrets::{CookieSpec, SecretStore};
use super::seed::make_seed;
use super::{Navigation, Page, Session, SessionProvider, SessionSpec};

const MAX_REDIRECTS: usize = 10;

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static META: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b([^>]*)>").expect("valid regex"));
static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static TAG_SELECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9]*$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Opens [`HttpSession`]s according to a flow's [`SessionSpec`].
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    secrets: SecretStore,
    nav_timeout: Duration,
    seed: Option<u64>,
}

impl HttpSessionProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            secrets: SecretStore::new(&settings.secrets_dir),
            nav_timeout: Duration::from_secs(settings.nav_timeout_secs.max(1)),
            seed: None,
        }
    }

    /// Pin the profile seed so every session presents the same identity.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[async_trait]
impl SessionProvider for HttpSessionProvider {
    async fn open(&self, spec: &SessionSpec) -> Result<Arc<dyn Session>, FlowError> {
        let profile = make_seed(self.seed);
        let jar = Arc::new(Jar::default());

        if spec.mode == SessionMode::CookiesAuth && !spec.secret_names.is_empty() {
            let cookies = self.secrets.cookies(&spec.secret_names)?;
            let injected = cookies.iter().filter(|c| inject_cookie(&jar, c)).count();
            tracing::info!(count = injected, "Cookies injected");
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(profile.accept_language));

        let client = reqwest::Client::builder()
            .user_agent(profile.user_agent)
            .default_headers(headers)
            .cookie_provider(jar)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(self.nav_timeout)
            .build()
            .map_err(|e| FlowError::navigation(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(mode = %spec.mode, secrets = spec.secret_names.len(), "Session opened");
        Ok(Arc::new(HttpSession::new(client)))
    }
}

/// Add one cookie to the jar; cookies without a usable domain are skipped.
fn inject_cookie(jar: &Jar, cookie: &CookieSpec) -> bool {
    let Some(domain) = cookie.domain.as_deref().map(|d| d.trim_start_matches('.')) else {
        tracing::warn!(name = %cookie.name, "Cookie without domain, skipping");
        return false;
    };
    let scheme = if cookie.secure { "https" } else { "http" };
    let Ok(url) = reqwest::Url::parse(&format!("{scheme}://{domain}{}", cookie.path)) else {
        tracing::warn!(name = %cookie.name, domain, "Cookie domain is not a valid host, skipping");
        return false;
    };

    let mut header = format!(
        "{}={}; Domain={domain}; Path={}",
        cookie.name, cookie.value, cookie.path
    );
    if cookie.secure {
        header.push_str("; Secure");
    }
    if cookie.http_only {
        header.push_str("; HttpOnly");
    }
    jar.add_cookie_str(&header, &url);
    true
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One request made while tracing was active.
#[derive(Debug, Clone, Serialize)]
struct TraceEntry {
    method: &'static str,
    url: String,
    final_url: Option<String>,
    status: Option<u16>,
    elapsed_ms: u64,
    error: Option<String>,
}

type TraceLog = Arc<Mutex<Option<Vec<TraceEntry>>>>;

/// Shared client plus the request log used for tracing.
pub struct HttpSession {
    client: reqwest::Client,
    trace: TraceLog,
    closed: AtomicBool,
}

impl HttpSession {
    fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            trace: Arc::new(Mutex::new(None)),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn new_page(&self) -> Result<Arc<dyn Page>, FlowError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FlowError::navigation("session is closed"));
        }
        Ok(Arc::new(HttpPage {
            client: self.client.clone(),
            trace: self.trace.clone(),
            document: Mutex::new(Document::blank()),
        }))
    }

    async fn start_tracing(&self) -> Result<(), FlowError> {
        *self.trace.lock().await = Some(Vec::new());
        Ok(())
    }

    async fn stop_tracing(&self, path: Option<&Path>) -> Result<(), FlowError> {
        let entries = self.trace.lock().await.take();
        let (Some(entries), Some(path)) = (entries, path) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(FlowError::unknown)?;
        }
        let body = serde_json::to_vec_pretty(&serde_json::json!({ "requests": entries }))
            .map_err(FlowError::unknown)?;
        tokio::fs::write(path, body)
            .await
            .map_err(FlowError::unknown)?;
        tracing::debug!(path = %path.display(), "Trace written");
        Ok(())
    }

    async fn close(&self) -> Result<(), FlowError> {
        self.closed.store(true, Ordering::SeqCst);
        self.trace.lock().await.take();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

struct Document {
    url: String,
    body: String,
}

impl Document {
    fn blank() -> Self {
        Self {
            url: "about:blank".to_string(),
            body: String::new(),
        }
    }
}

/// A page whose document is whatever the last navigation fetched.
pub struct HttpPage {
    client: reqwest::Client,
    trace: TraceLog,
    document: Mutex<Document>,
}

impl HttpPage {
    async fn record(&self, entry: TraceEntry) {
        if let Some(log) = self.trace.lock().await.as_mut() {
            log.push(entry);
        }
    }

    /// Elements for a bare tag-name selector, as inner text.
    async fn select(&self, selector: &str) -> Result<Vec<String>, FlowError> {
        if !TAG_SELECTOR.is_match(selector) {
            return Err(unsupported(&format!("selector '{selector}'")));
        }
        let pattern = format!(r"(?is)<{selector}\b[^>]*>(.*?)</{selector}\s*>");
        let re = Regex::new(&pattern).map_err(FlowError::unknown)?;
        let document = self.document.lock().await;
        Ok(re
            .captures_iter(&document.body)
            .map(|c| inner_text(&c[1]))
            .collect())
    }
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&self, url: &str) -> Result<Navigation, FlowError> {
        let started = Instant::now();
        let fetched = fetch(&self.client, url).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match fetched {
            Ok((status, final_url, body)) => {
                self.record(TraceEntry {
                    method: "GET",
                    url: url.to_string(),
                    final_url: Some(final_url.clone()),
                    status: Some(status),
                    elapsed_ms,
                    error: None,
                })
                .await;
                *self.document.lock().await = Document {
                    url: final_url.clone(),
                    body,
                };
                Ok(Navigation {
                    status: Some(status),
                    url: final_url,
                })
            }
            Err(err) => {
                self.record(TraceEntry {
                    method: "GET",
                    url: url.to_string(),
                    final_url: None,
                    status: None,
                    elapsed_ms,
                    error: Some(err.message.clone()),
                })
                .await;
                Err(err)
            }
        }
    }

    async fn title(&self) -> Result<String, FlowError> {
        let document = self.document.lock().await;
        Ok(TITLE
            .captures(&document.body)
            .map(|c| inner_text(&c[1]))
            .unwrap_or_default())
    }

    async fn url(&self) -> String {
        self.document.lock().await.url.clone()
    }

    async fn meta_tags(&self) -> Result<BTreeMap<String, String>, FlowError> {
        let document = self.document.lock().await;
        Ok(parse_meta_tags(&document.body))
    }

    async fn fill(&self, _selector: &str, _value: &str) -> Result<(), FlowError> {
        Err(unsupported("fill"))
    }

    async fn click(&self, _selector: &str) -> Result<(), FlowError> {
        Err(unsupported("click"))
    }

    async fn click_nth(&self, _selector: &str, _index: usize) -> Result<(), FlowError> {
        Err(unsupported("click"))
    }

    async fn wait_for(&self, selector: &str) -> Result<(), FlowError> {
        if self.select(selector).await?.is_empty() {
            return Err(FlowError::navigation(format!("no element matches '{selector}'")));
        }
        Ok(())
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, FlowError> {
        self.select(selector).await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, FlowError> {
        Ok(!self.select(selector).await?.is_empty())
    }

    async fn close(&self) -> Result<(), FlowError> {
        *self.document.lock().await = Document::blank();
        Ok(())
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<(u16, String, String), FlowError> {
    let response = client.get(url).send().await.map_err(map_request_error)?;
    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let body = response.text().await.map_err(map_request_error)?;
    Ok((status, final_url, body))
}

fn map_request_error(err: reqwest::Error) -> FlowError {
    if err.is_timeout() {
        FlowError::timeout(err.to_string())
    } else {
        FlowError::navigation(err.to_string())
    }
}

fn unsupported(action: &str) -> FlowError {
    FlowError::navigation(format!("{action} is not supported by the HTTP session driver"))
}

/// Strip markup and collapse whitespace.
fn inner_text(html: &str) -> String {
    let text = TAGS.replace_all(html, " ");
    SPACES.replace_all(text.trim(), " ").into_owned()
}

/// `name`/`property` -> `content` for every `<meta>` that has both.
fn parse_meta_tags(body: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    for meta in META.captures_iter(body) {
        let mut key = None;
        let mut content = None;
        for attr in ATTR.captures_iter(&meta[1]) {
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match attr[1].to_ascii_lowercase().as_str() {
                "name" | "property" if key.is_none() => key = Some(value),
                "content" => content = Some(value),
                _ => {}
            }
        }
        if let (Some(key), Some(content)) = (key, content) {
            if !key.is_empty() && !content.is_empty() {
                tags.insert(key, content);
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_tags_use_name_or_property() {
        let html = r#"
            <head>
              <meta charset="utf-8">
              <meta name="description" content="A page">
              <meta property='og:title' content='Hello'>
              <META NAME="robots" CONTENT="noindex">
              <meta name="empty" content="">
            </head>"#;
        let tags = parse_meta_tags(html);
        assert_eq!(tags.len(), 3);
        assert_eq!(tags["description"], "A page");
        assert_eq!(tags["og:title"], "Hello");
        assert_eq!(tags["robots"], "noindex");
    }

    #[test]
    fn inner_text_strips_markup() {
        assert_eq!(inner_text("  <b>Thank</b>\n you  "), "Thank you");
    }

    #[test]
    fn interactive_actions_are_unsupported() {
        let err = unsupported("fill");
        assert_eq!(err.code, autosuite_core::error_code::ErrorCode::NavigationError);
        assert!(err.message.contains("not supported by the HTTP session driver"));
    }
}
