use autosuite_core::flow::FlowType;
use autosuite_core::types::JsonMap;
use autosuite_db::models::job::NewJob;
use autosuite_db::DbPool;
use serde_json::json;
use tempfile::TempDir;

/// A migrated SQLite database living in a temporary directory.
///
/// The directory (and the database file) is removed when dropped.
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

pub fn url_item(url: &str) -> JsonMap {
    match json!({ "url": url }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn new_job(id: &str, urls: &[&str]) -> NewJob {
    NewJob {
        id: id.to_string(),
        flow_type: FlowType::CrawlSimple,
        options: JsonMap::new(),
        items: urls.iter().map(|u| url_item(u)).collect(),
    }
}
