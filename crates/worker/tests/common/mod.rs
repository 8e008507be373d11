#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use autosuite_core::flow::FlowType;
use autosuite_core::types::JsonMap;
use autosuite_db::models::job::NewJob;
use autosuite_db::repositories::JobRepo;
use autosuite_db::DbPool;
use autosuite_worker::{LaunchError, Scheduler, WorkerLauncher};
use serde_json::json;
use tempfile::TempDir;

/// First fake pid; far above any kernel pid_max so signals never land.
pub const FAKE_PID_BASE: u32 = 2_000_000_000;

/// A migrated SQLite database living in a temporary directory.
pub struct TestDb {
    pub pool: DbPool,
    pub url: String,
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("autosuite.db").display());
    let pool = autosuite_db::create_pool(&url).await.unwrap();
    autosuite_db::run_migrations(&pool).await.unwrap();
    TestDb {
        pool,
        url,
        _dir: dir,
    }
}

/// Records launches instead of starting processes.
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
        Ok(FAKE_PID_BASE + self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Every launch fails as if the executable were missing.
pub struct BrokenLauncher;

#[async_trait]
impl WorkerLauncher for BrokenLauncher {
    async fn launch(&self, job_id: &str) -> Result<u32, LaunchError> {
        Err(LaunchError::Spawn {
            job_id: job_id.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        })
    }
}

pub fn scheduler(pool: &DbPool, max_workers: u32) -> (Scheduler, Arc<RecordingLauncher>) {
    let launcher = Arc::new(RecordingLauncher::default());
    let scheduler = Scheduler::new(pool.clone(), launcher.clone(), max_workers);
    (scheduler, launcher)
}

pub fn url_item(url: &str) -> JsonMap {
    match json!({ "url": url }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub async fn create_crawl_job(pool: &DbPool, id: &str, urls: &[&str]) {
    JobRepo::create(
        pool,
        &NewJob {
            id: id.to_string(),
            flow_type: FlowType::CrawlSimple,
            options: JsonMap::new(),
            items: urls.iter().map(|u| url_item(u)).collect(),
        },
    )
    .await
    .unwrap();
}
