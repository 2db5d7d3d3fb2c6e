#[path = "../src/api_client.rs"]
#[allow(dead_code)] // Some methods are used by the binary but not by tests
mod api_client;

use api_client::{ApiClient, StartImportRequest};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn job_json(status: &str) -> serde_json::Value {
    json!({
        "job_id": "7f0c1f7e-8a55-4f71-9d8e-4c5b8f1f2a10",
        "status": status,
        "trigger": "manual",
        "requested_by": "ops",
        "processed_count": 112,
        "total_count": 112,
        "pages_fetched": 3,
        "error_message": null,
        "started_at": "2026-01-01T00:00:00Z",
        "finished_at": null,
        "updated_at": "2026-01-01T00:00:05Z"
    })
}

#[tokio::test]
async fn start_import_sends_token_and_body() {
    if !can_bind_localhost() {
        eprintln!("skipping: cannot bind localhost");
        return;
    }
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/imports")
            .header("authorization", "Bearer secret")
            .json_body(json!({"trigger": "manual", "requested_by": "ops"}));
        then.status(202).json_body(job_json("running"));
    });

    let client = ApiClient::new(&server.base_url(), Some("secret")).unwrap();
    let job = client
        .start_import(StartImportRequest {
            trigger: Some("manual".to_string()),
            requested_by: Some("ops".to_string()),
        })
        .await
        .unwrap();

    mock.assert();
    assert!(job.is_running());
    assert_eq!(job.processed_count, 112);
    assert_eq!(job.total_count, Some(112));
}

#[tokio::test]
async fn no_token_sends_no_authorization_header() {
    if !can_bind_localhost() {
        eprintln!("skipping: cannot bind localhost");
        return;
    }
    let server = MockServer::start();
    let with_header = server.mock(|when, then| {
        when.method(GET).path("/v1/health").header_exists("authorization");
        then.status(500);
    });
    let without_header = server.mock(|when, then| {
        when.method(GET).path("/v1/health");
        then.status(200)
            .json_body(json!({"status": "ok", "version": "0.1.0"}));
    });

    let client = ApiClient::new(&server.base_url(), None).unwrap();
    let health = client.health().await.unwrap();

    assert_eq!(health.status, "ok");
    with_header.assert_hits(0);
    without_header.assert();
}

#[tokio::test]
async fn error_status_surfaces_body() {
    if !can_bind_localhost() {
        eprintln!("skipping: cannot bind localhost");
        return;
    }
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/imports/nope");
        then.status(400)
            .json_body(json!({"code": "bad_request", "message": "invalid job ID"}));
    });

    let client = ApiClient::new(&server.base_url(), Some("secret")).unwrap();
    let err = client.get_import("nope").await.unwrap_err().to_string();

    assert!(err.contains("400"), "{err}");
    assert!(err.contains("invalid job ID"), "{err}");
}

#[tokio::test]
async fn list_and_search_pass_query_parameters() {
    if !can_bind_localhost() {
        eprintln!("skipping: cannot bind localhost");
        return;
    }
    let server = MockServer::start();
    let record = json!({
        "fid": "F-1",
        "name": "Kopi Kenangan",
        "company": "PT Kopi",
        "company_address": null,
        "created_at": null,
        "updated_at": null,
        "outlet_count": 2,
        "active_outlet_count": 1,
        "outlets": [{"id": "O-1", "name": "Senayan", "is_active": true}],
        "import_index": 12,
        "job_id": "7f0c1f7e-8a55-4f71-9d8e-4c5b8f1f2a10"
    });
    let list = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/franchises")
            .query_param("page", "2")
            .query_param("per_page", "25")
            .query_param("sort", "name_asc");
        then.status(200).json_body(json!({
            "page": 2,
            "per_page": 25,
            "total_count": 26,
            "total_pages": 2,
            "sort": "name_asc",
            "records": [record.clone()]
        }));
    });
    let search = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/franchises/search")
            .query_param("q", "kopi kenangan")
            .query_param("limit", "5");
        then.status(200).json_body(json!({
            "query": "kopi kenangan",
            "count": 1,
            "records": [record]
        }));
    });

    let client = ApiClient::new(&server.base_url(), Some("secret")).unwrap();
    let page = client
        .list_franchises(Some(2), Some(25), Some("name_asc"))
        .await
        .unwrap();
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.records[0].import_index, 12);
    assert_eq!(page.records[0].outlets[0].name.as_deref(), Some("Senayan"));

    let found = client
        .search_franchises("kopi kenangan", None, Some(5))
        .await
        .unwrap();
    assert_eq!(found.count, 1);

    list.assert();
    search.assert();
}

#[tokio::test]
async fn lookup_handles_null_body() {
    if !can_bind_localhost() {
        eprintln!("skipping: cannot bind localhost");
        return;
    }
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/lookup/F-1/O-1");
        then.status(200).json_body(json!({
            "franchise_name": "Kopi",
            "outlet_name": "Senayan",
            "found": true
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/lookup/F-2/O-2");
        then.status(200).body("null");
    });

    let client = ApiClient::new(&server.base_url(), None).unwrap();
    let found = client.lookup("F-1", "O-1").await.unwrap().unwrap();
    assert!(found.found);
    assert_eq!(found.outlet_name.as_deref(), Some("Senayan"));

    assert!(client.lookup("F-2", "O-2").await.unwrap().is_none());
}
