//! HTTP API tests driven through the router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{
    ScriptedDirectory, TEST_API_TOKEN, TestServer, franchise_record, raw_franchises,
    wait_for_job,
};
use dircache_core::ImportTrigger;
use dircache_metadata::models::ImportJobRow;
use dircache_upstream::OutletLookup;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(server: &TestServer, req: Request<Body>) -> (StatusCode, Value) {
    let response = server.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

async fn get(server: &TestServer, uri: &str) -> (StatusCode, Value) {
    send(server, request("GET", uri, Some(TEST_API_TOKEN), None)).await
}

/// Install an active generation directly through the store.
async fn seed(server: &TestServer, names: &[&str]) -> Uuid {
    let metadata = server.metadata();
    let job = ImportJobRow::new_running(ImportTrigger::Cron, None, OffsetDateTime::now_utc());
    metadata.create_import_job(&job).await.unwrap();
    let records: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, name)| franchise_record(&format!("F-{}", i + 1), name))
        .collect();
    metadata
        .insert_cache_records(job.job_id, 1, &records)
        .await
        .unwrap();
    metadata
        .promote_generation(job.job_id, OffsetDateTime::now_utc())
        .await
        .unwrap();
    job.job_id
}

#[tokio::test]
async fn health_needs_no_token() {
    let server = TestServer::new(ScriptedDirectory::new()).await;
    let (status, body) = send(&server, request("GET", "/v1/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn protected_routes_require_valid_token() {
    let server = TestServer::new(ScriptedDirectory::new()).await;

    for uri in [
        "/v1/franchises",
        "/v1/franchises/search?q=a",
        "/v1/franchises/metrics",
        "/v1/imports",
        "/v1/lookup/F-1/O-1",
    ] {
        let (status, body) = send(&server, request("GET", uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["code"], "unauthorized");

        let (status, _) = send(&server, request("GET", uri, Some("wrong-token"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    let (status, _) = send(&server, request("POST", "/v1/imports", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(server.directory.fetch_count(), 0);
}

#[tokio::test]
async fn bearer_scheme_is_case_insensitive() {
    let server = TestServer::new(ScriptedDirectory::new()).await;
    let req = Request::builder()
        .uri("/v1/franchises")
        .header(header::AUTHORIZATION, format!("bearer {TEST_API_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&server, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn open_mode_without_token_hash() {
    let server = TestServer::with_config(ScriptedDirectory::new(), |config| {
        config.api.token_hash = None;
    })
    .await;
    let (status, body) = send(&server, request("GET", "/v1/franchises", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn start_import_then_report_running_job() {
    let directory = ScriptedDirectory::new()
        .gated()
        .with_page(1, raw_franchises(1, 4), None, None);
    let server = TestServer::new(directory).await;

    let (status, first) = send(
        &server,
        request(
            "POST",
            "/v1/imports",
            Some(TEST_API_TOKEN),
            Some(json!({"trigger": "manual", "requested_by": "ops"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(first["status"], "running");
    assert_eq!(first["trigger"], "manual");
    assert_eq!(first["requested_by"], "ops");
    assert_eq!(first["processed_count"], 0);
    let job_id = first["job_id"].as_str().unwrap().to_string();

    // Empty body while running: same job, 200.
    let (status, second) = send(
        &server,
        request("POST", "/v1/imports", Some(TEST_API_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["job_id"], job_id.as_str());

    let (status, job) = get(&server, &format!("/v1/imports/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "running");
    assert!(job["finished_at"].is_null());

    server.directory.release(10);
    let id = Uuid::parse_str(&job_id).unwrap();
    wait_for_job(&server.metadata(), id).await;

    let (status, job) = get(&server, &format!("/v1/imports/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "completed");
    assert_eq!(job["processed_count"], 4);
    assert_eq!(job["total_count"], 4);
    assert!(job["finished_at"].is_string());

    let (status, jobs) = get(&server, "/v1/imports?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs.as_array().unwrap().len(), 1);
    assert_eq!(jobs[0]["job_id"], job_id.as_str());
}

#[tokio::test]
async fn start_import_rejects_bad_input() {
    let server = TestServer::new(ScriptedDirectory::new()).await;

    let (status, body) = send(
        &server,
        request(
            "POST",
            "/v1/imports",
            Some(TEST_API_TOKEN),
            Some(json!({"trigger": "weekly"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "core_error");

    let req = Request::builder()
        .method("POST")
        .uri("/v1/imports")
        .header(header::AUTHORIZATION, format!("Bearer {TEST_API_TOKEN}"))
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&server, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    assert_eq!(server.directory.fetch_count(), 0);
}

#[tokio::test]
async fn get_import_validates_id() {
    let server = TestServer::new(ScriptedDirectory::new()).await;

    let (status, _) = get(&server, "/v1/imports/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&server, &format!("/v1/imports/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn list_franchises_pages_and_sorts() {
    let server = TestServer::new(ScriptedDirectory::new()).await;
    let job_id = seed(&server, &["Bakso", "ayam", "Cendol"]).await;

    let (status, body) = get(&server, "/v1/franchises?per_page=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 2);
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["sort"], "latest");
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["name"], "Cendol");
    assert_eq!(records[0]["import_index"], 3);
    assert_eq!(records[0]["job_id"], job_id.to_string());
    assert_eq!(records[0]["outlet_count"], 1);
    assert_eq!(records[0]["outlets"][0]["id"], "F-3-O1");

    let (_, body) = get(&server, "/v1/franchises?per_page=2&page=2").await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["records"][0]["name"], "Bakso");

    let (_, body) = get(&server, "/v1/franchises?sort=name_asc").await;
    let names: Vec<&str> = body["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ayam", "Bakso", "Cendol"]);

    // Oversized page sizes are clamped.
    let (_, body) = get(&server, "/v1/franchises?per_page=100000").await;
    assert_eq!(body["per_page"], 200);

    let (status, body) = get(&server, "/v1/franchises?sort=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("sideways"));
}

#[tokio::test]
async fn search_and_metrics() {
    let server = TestServer::new(ScriptedDirectory::new()).await;
    seed(&server, &["Kopi Kenangan", "Teh Manis", "Kopi Janji Jiwa"]).await;

    let (status, body) = get(&server, "/v1/franchises/search?q=KOPI&sort=name_asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "KOPI");
    assert_eq!(body["count"], 2);
    assert_eq!(body["records"][0]["name"], "Kopi Janji Jiwa");

    let (_, body) = get(&server, "/v1/franchises/search?q=kopi&limit=1").await;
    assert_eq!(body["count"], 1);

    let (_, body) = get(&server, "/v1/franchises/search").await;
    assert_eq!(body["count"], 3);

    let (status, body) = get(&server, "/v1/franchises/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_franchises"], 3);
    assert_eq!(body["total_outlets"], 3);
    assert_eq!(body["total_active_outlets"], 3);
}

#[tokio::test]
async fn lookup_passes_through_directory_answer() {
    let directory = ScriptedDirectory::new()
        .with_outlet(
            "F-1",
            "O-1",
            Some(OutletLookup {
                franchise_name: Some("Kopi Kenangan".to_string()),
                outlet_name: Some("Senayan".to_string()),
                found: true,
            }),
        )
        .with_outlet("F-1", "O-down", None);
    let server = TestServer::new(directory).await;

    let (status, body) = get(&server, "/v1/lookup/F-1/O-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"franchise_name": "Kopi Kenangan", "outlet_name": "Senayan", "found": true})
    );

    let (status, body) = get(&server, "/v1/lookup/F-1/O-missing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], false);
    assert!(body["franchise_name"].is_null());

    let (status, body) = get(&server, "/v1/lookup/F-1/O-down").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());

    let (status, _) = get(&server, "/v1/lookup/%20/O-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_endpoint_follows_config() {
    dircache_server::metrics::register_metrics();

    let server = TestServer::new(ScriptedDirectory::new()).await;
    let (status, body) = send(&server, request("GET", "/metrics", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        body.as_str()
            .unwrap()
            .contains("dircache_import_jobs_started_total")
    );

    let server = TestServer::with_config(ScriptedDirectory::new(), |config| {
        config.server.metrics_enabled = false;
    })
    .await;
    let (status, _) = send(&server, request("GET", "/metrics", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trace_id_is_echoed() {
    let server = TestServer::new(ScriptedDirectory::new()).await;
    let req = Request::builder()
        .uri("/v1/health")
        .header("x-trace-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-trace-id")
            .and_then(|v| v.to_str().ok()),
        Some("abc-123")
    );
}
