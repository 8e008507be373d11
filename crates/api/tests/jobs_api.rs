//! HTTP-level integration tests for the `/jobs` and `/flows` endpoints.
//!
//! Worker processes are replaced by a recording launcher, so scheduling is
//! observable without anything running.

mod common;

use autosuite_core::settings::Settings;
use axum::http::StatusCode;
use common::{
    body_json, build_test_app, get, post_json, post_json_with_headers, post_raw, test_settings,
    TestApp,
};
use serde_json::{json, Value};

const JOBS: &str = "/api/v1/jobs";

fn crawl(urls: &[&str]) -> Value {
    let items: Vec<Value> = urls.iter().map(|u| json!({ "url": u })).collect();
    json!({ "flow_type": "CRAWL_SIMPLE", "items": items })
}

async fn create(t: &TestApp, urls: &[&str]) -> String {
    let response = post_json(t.app(), JOBS, crawl(urls)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_201_and_schedules_the_job() {
    let t = build_test_app(test_settings()).await;

    let response = post_json(t.app(), JOBS, crawl(&["https://a.test", "https://b.test"])).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let job_id = json["job_id"].as_str().unwrap().to_string();
    assert_eq!(json["status"], "PENDING");
    assert_eq!(json["items_count"], 2);
    assert_eq!(t.launcher.launched(), vec![job_id.clone()]);

    let job = body_json(get(t.app(), &format!("{JOBS}/{job_id}")).await).await;
    assert_eq!(job["status"], "RUNNING");
    assert_eq!(job["flow_type"], "CRAWL_SIMPLE");
    assert!(job["finished_at"].is_null());
}

#[tokio::test]
async fn same_idempotency_key_returns_the_existing_job() {
    let t = build_test_app(test_settings()).await;
    let headers = [("idempotency-key", "order-42")];

    let first = post_json_with_headers(t.app(), JOBS, crawl(&["https://a.test"]), &headers).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = body_json(first).await;

    let second = post_json_with_headers(
        t.app(),
        JOBS,
        crawl(&["https://other.test", "https://more.test"]),
        &headers,
    )
    .await;
    assert_eq!(second.status(), StatusCode::OK);
    let second = body_json(second).await;

    assert_eq!(second["job_id"], first["job_id"]);
    assert_eq!(second["items_count"], 1);
    assert_eq!(t.launcher.launched().len(), 1);

    let uri = format!("{JOBS}/{}/items", first["job_id"].as_str().unwrap());
    let items = body_json(get(t.app(), &uri).await).await;
    assert_eq!(items["items"][0]["input"]["url"], "https://a.test");
}

#[tokio::test]
async fn submissions_without_a_key_get_distinct_ids() {
    let t = build_test_app(test_settings()).await;

    let a = create(&t, &["https://a.test"]).await;
    let b = create(&t, &["https://a.test"]).await;

    assert_ne!(a, b);
}

#[tokio::test]
async fn too_many_items_is_rejected_with_413() {
    let t = build_test_app(test_settings()).await;
    let urls = ["https://a.test", "https://b.test", "https://c.test", "https://d.test"];

    let response = post_json(t.app(), JOBS, crawl(&urls)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let json = body_json(response).await;
    assert_eq!(json["error"], "too_many_items");
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
    assert!(t.launcher.launched().is_empty());
}

#[tokio::test]
async fn oversized_body_is_rejected_with_413() {
    let t = build_test_app(test_settings()).await;
    let url = format!("https://a.test/{}", "x".repeat(8 * 1024));

    let response = post_json(t.app(), JOBS, crawl(&[url.as_str()])).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"], "payload_too_large");
}

#[tokio::test]
async fn invalid_items_are_reported_per_index() {
    let t = build_test_app(test_settings()).await;

    let body = json!({
        "flow_type": "CRAWL_SIMPLE",
        "items": [{ "url": "https://ok.test" }, { "url": "ftp://files.test" }, {}],
    });
    let response = post_json(t.app(), JOBS, body).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_failed");
    let errors = json["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["idx"], 1);
    assert_eq!(errors[0]["code"], "INVALID_SCHEME");
    assert_eq!(errors[1]["idx"], 2);
    assert_eq!(errors[1]["code"], "MISSING_URL");

    let list = body_json(get(t.app(), JOBS).await).await;
    assert!(list["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_flow_is_rejected_with_422() {
    let t = build_test_app(test_settings()).await;

    let body = json!({ "flow_type": "FLOW_NOPE", "items": [{ "url": "https://a.test" }] });
    let response = post_json(t.app(), JOBS, body).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["code"], "UNSUPPORTED_FLOW");
    assert_eq!(json["error"], "unsupported flow: FLOW_NOPE");
}

#[tokio::test]
async fn empty_items_are_rejected_with_400() {
    let t = build_test_app(test_settings()).await;

    let body = json!({ "flow_type": "CRAWL_SIMPLE", "items": [] });
    let response = post_json(t.app(), JOBS, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let t = build_test_app(test_settings()).await;

    let response = post_raw(t.app(), JOBS, "{not json".to_string(), &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn items_are_stored_with_index_and_raw_text() {
    let t = build_test_app(test_settings()).await;

    let body = json!({
        "flow_type": "CRAWL_SIMPLE",
        "items": [
            { "url": "https://a.test" },
            { "url": "https://b.test", "meta": { "raw_text": "row 2", "source": "csv" } },
        ],
    });
    let response = post_json(t.app(), JOBS, body).await;
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    let json = body_json(get(t.app(), &format!("{JOBS}/{job_id}/items")).await).await;
    assert_eq!(json["job_id"], job_id.as_str());

    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["idx"], 0);
    assert_eq!(items[0]["status"], "PENDING");
    assert_eq!(
        items[0]["input"]["meta"],
        json!({ "idx": 0, "raw_text": "url=https://a.test" })
    );
    assert_eq!(items[1]["input"]["meta"]["raw_text"], "row 2");
    assert_eq!(items[1]["input"]["meta"]["source"], "csv");
    assert_eq!(items[1]["input"]["meta"]["idx"], 1);
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_is_newest_first_and_paged() {
    let t = build_test_app(test_settings()).await;
    let first = create(&t, &["https://a.test"]).await;
    let second = create(&t, &["https://b.test"]).await;
    let third = create(&t, &["https://c.test"]).await;

    let page1 = body_json(get(t.app(), JOBS).await).await;
    assert_eq!(page1["page"], 1);
    assert_eq!(page1["page_size"], 2);
    let ids: Vec<&str> = page1["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![third.as_str(), second.as_str()]);

    let page2 = body_json(get(t.app(), &format!("{JOBS}?page=2")).await).await;
    assert_eq!(page2["items"][0]["id"], first.as_str());
    assert_eq!(page2["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_filters_by_status_and_clamps_page_size() {
    let t = build_test_app(test_settings()).await;
    let running = create(&t, &["https://a.test"]).await;
    for url in ["https://b.test", "https://c.test", "https://d.test"] {
        create(&t, &[url]).await;
    }

    let json = body_json(get(t.app(), &format!("{JOBS}?status=running")).await).await;
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], running.as_str());

    let json = body_json(get(t.app(), &format!("{JOBS}?page_size=999")).await).await;
    assert_eq!(json["page_size"], 3);
    assert_eq!(json["items"].as_array().unwrap().len(), 3);

    let json = body_json(get(t.app(), &format!("{JOBS}?flow_type=FLOW_SAUCE_DEMO")).await).await;
    assert!(json["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_rejects_unknown_status() {
    let t = build_test_app(test_settings()).await;

    let response = get(t.app(), &format!("{JOBS}?status=sleeping")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_404() {
    let t = build_test_app(test_settings()).await;

    for uri in [format!("{JOBS}/missing"), format!("{JOBS}/missing/items")] {
        let response = get(t.app(), &uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["error"], "job with id missing not found");
    }

    let response = post_json(t.app(), &format!("{JOBS}/missing/cancel"), json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelling_a_pending_job_is_final_and_repeatable() {
    let t = build_test_app(test_settings()).await;
    let _running = create(&t, &["https://a.test"]).await;
    let queued = create(&t, &["https://b.test", "https://c.test"]).await;

    let uri = format!("{JOBS}/{queued}/cancel");
    let response = post_json(t.app(), &uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "CANCELLED");
    assert_eq!(json["counts"]["cancelled"], 2);
    assert!(json["finished_at"].is_string());

    let again = body_json(post_json(t.app(), &uri, json!({})).await).await;
    assert_eq!(again["status"], "CANCELLED");
    assert_eq!(again["finished_at"], json["finished_at"]);
    assert_eq!(t.launcher.launched().len(), 1);
}

#[tokio::test]
async fn cancelling_the_running_job_admits_the_next_one() {
    let t = build_test_app(test_settings()).await;
    let running = create(&t, &["https://a.test"]).await;
    let queued = create(&t, &["https://b.test"]).await;
    assert_eq!(t.launcher.launched(), vec![running.clone()]);

    let response = post_json(t.app(), &format!("{JOBS}/{running}/cancel"), json!({})).await;
    assert_eq!(body_json(response).await["status"], "CANCELLED");

    assert_eq!(t.launcher.launched(), vec![running, queued.clone()]);
    let job = body_json(get(t.app(), &format!("{JOBS}/{queued}")).await).await;
    assert_eq!(job["status"], "RUNNING");
}

// ---------------------------------------------------------------------------
// API key
// ---------------------------------------------------------------------------

#[tokio::test]
async fn api_key_guards_api_routes_but_not_health() {
    let t = build_test_app(Settings {
        api_key_enabled: true,
        api_key: "s3cret".to_string(),
        ..test_settings()
    })
    .await;

    let missing = get(t.app(), JOBS).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(missing).await["error"], "Missing X-API-Key header");

    let body = crawl(&["https://a.test"]);
    let wrong = post_json_with_headers(t.app(), JOBS, body.clone(), &[("x-api-key", "nope")]).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(t.launcher.launched().is_empty());

    let ok = post_json_with_headers(t.app(), JOBS, body, &[("x-api-key", "s3cret")]).await;
    assert_eq!(ok.status(), StatusCode::CREATED);

    assert_eq!(get(t.app(), "/health").await.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn flows_lists_every_builtin_flow() {
    let t = build_test_app(test_settings()).await;

    let json = body_json(get(t.app(), "/api/v1/flows").await).await;
    let flows = json.as_array().unwrap();
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0]["slug"], "crawl-simple");
    assert_eq!(flows[0]["flow_type"], "CRAWL_SIMPLE");
    assert_eq!(flows[0]["session"]["mode"], "NON_AUTH");
    assert_eq!(flows[1]["slug"], "sauce-demo");
    assert_eq!(flows[1]["session"]["mode"], "FORM_AUTH");
}

#[tokio::test]
async fn input_spec_describes_fields_and_options() {
    let t = build_test_app(test_settings()).await;

    let response = get(t.app(), "/api/v1/flows/sauce-demo/input-spec").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["flow_type"], "FLOW_SAUCE_DEMO");
    let names: Vec<&str> = json["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"first_name"));
    assert!(names.contains(&"product_names"));
    assert!(json["field_options"]["product_names"].is_array());
}

#[tokio::test]
async fn input_spec_for_unknown_slug_is_404() {
    let t = build_test_app(test_settings()).await;

    let response = get(t.app(), "/api/v1/flows/nope/input-spec").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "flow with id nope not found");
}
