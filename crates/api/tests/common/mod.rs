#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use autosuite_api::config::ServerConfig;
use autosuite_api::prometheus;
use autosuite_api::router::build_app_router;
use autosuite_api::state::AppState;
use autosuite_core::settings::Settings;
use autosuite_db::DbPool;
use autosuite_engine::FlowRegistry;
use autosuite_worker::{LaunchError, Scheduler, WorkerLauncher};
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusHandle;
use tempfile::TempDir;
use tower::ServiceExt;

/// One global recorder per test binary, shared by every app that enables
/// metrics. Counters therefore accumulate across tests in the same binary.
static METRICS: LazyLock<PrometheusHandle> =
    LazyLock::new(|| prometheus::install_recorder().expect("first recorder in this binary"));

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Settings with small limits so the edges are cheap to reach.
pub fn test_settings() -> Settings {
    Settings {
        executor_max_workers: 1,
        max_items_per_job: 3,
        payload_max_bytes: 4 * 1024,
        page_size_default: 2,
        page_size_max: 3,
        scheduler_sweep_secs: 0,
        ..Settings::default()
    }
}

/// Records launches instead of starting worker processes.
///
/// Pids start far above any kernel pid_max so cancel signals never land.
#[derive(Default)]
pub struct RecordingLauncher {
    next: AtomicU32,
    launched: Mutex<Vec<String>>,
}

impl RecordingLauncher {
    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerLauncher for RecordingLauncher {
    async fn launch(&self, job_id: &str) -> Result<u32, LaunchError> {
        self.launched.lock().unwrap().push(job_id.to_string());
        Ok(2_000_000_000 + self.next.fetch_add(1, Ordering::SeqCst))
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub launcher: Arc<RecordingLauncher>,
    _dir: TempDir,
}

impl TestApp {
    /// A fresh handle to the router; `oneshot` consumes it.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router over a fresh migrated database.
///
/// Goes through [`build_app_router`] so tests exercise the same middleware
/// stack production uses.
pub async fn build_test_app(settings: Settings) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("api.db").display());
    let pool = autosuite_db::create_pool(&url).await.unwrap();
    autosuite_db::run_migrations(&pool).await.unwrap();

    // Installed before anything can claim a job.
    let metrics = settings.metrics_enabled.then(|| METRICS.clone());
    let settings = Arc::new(settings);
    let launcher = Arc::new(RecordingLauncher::default());
    let scheduler = Scheduler::new(
        pool.clone(),
        launcher.clone(),
        settings.executor_max_workers,
    );

    let config = test_config();
    let state = AppState {
        pool: pool.clone(),
        settings: Arc::clone(&settings),
        config: Arc::new(config.clone()),
        registry: Arc::new(FlowRegistry::with_http_sessions(Arc::clone(&settings))),
        scheduler,
        metrics,
    };

    TestApp {
        router: build_app_router(state, &config),
        pool,
        launcher,
        _dir: dir,
    }
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    post_json_with_headers(app, uri, body, &[]).await
}

pub async fn post_json_with_headers(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    headers: &[(&str, &str)],
) -> Response {
    post_raw(app, uri, body.to_string(), headers).await
}

pub async fn post_raw(
    app: Router,
    uri: &str,
    body: String,
    headers: &[(&str, &str)],
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::from(body)).unwrap()).await
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
