//! End-to-end tests for the dataset endpoints over in-memory persistence and
//! a local object store.

mod common;

use axum::http::StatusCode;
use common::{body_bytes, body_json, get, post_json, put_json, TestApp};
use serde_json::{json, Value};

async fn ingest(app: &TestApp, dataset_id: &str, files: &[(&str, &[u8])]) -> Value {
    let dir = app.extract(dataset_id, files).await;
    let response = post_json(
        app.app(),
        "/api/v1/datasets/ingest",
        json!({
            "dataset_id": dataset_id,
            "name": format!("{dataset_id}.zip"),
            "data_type": "image",
            "client_id": "client-1",
            "classes": "cat, dog",
            "extract_dir": dir,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await["data"].clone()
}

fn record_ids(report: &Value) -> Vec<String> {
    report["record_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_creates_records_and_queues_uploads() {
    let app = TestApp::new(&["ann-1"]);

    let report = ingest(&app, "ds1", &[("a.txt", b"abc"), ("b.txt", b"0123456789")]).await;

    assert_eq!(report["dataset_id"], "ds1");
    assert_eq!(record_ids(&report).len(), 2);
    assert_eq!(report["whole_file_jobs"], 1);
    assert_eq!(report["chunk_jobs"], 3);
    let json = body_json(get(app.app(), "/api/v1/datasets/ds1/uploads").await).await;
    assert_eq!(json["data"]["pending"], 4);
    assert_eq!(json["data"]["settled"], false);

    assert_eq!(app.drain_uploads().await, 4);

    let json = body_json(get(app.app(), "/api/v1/datasets/ds1/uploads").await).await;
    assert_eq!(json["data"]["completed"], 4);
    assert_eq!(json["data"]["settled"], true);

    let response = get(app.app(), "/api/v1/datasets?client_id=client-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let datasets = json["data"].as_array().unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0]["id"], "ds1");
    assert_eq!(datasets[0]["num_of_classes"], 2);
    assert_eq!(datasets[0]["size_bytes"], 13);
}

#[tokio::test]
async fn ingest_with_explicit_files_rejects_paths_outside_the_batch() {
    let app = TestApp::new(&["ann-1"]);
    let dir = app.extract("ds1", &[("a.txt", b"abc")]).await;

    let response = post_json(
        app.app(),
        "/api/v1/datasets/ingest",
        json!({
            "dataset_id": "ds1",
            "name": "ds1.zip",
            "data_type": "text",
            "client_id": "client-1",
            "extract_dir": dir,
            "files": ["../a.txt"],
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn ingest_from_outside_the_extract_root_is_rejected_and_left_in_place() {
    let app = TestApp::new(&["ann-1"]);
    let elsewhere = tempfile::TempDir::new().unwrap();
    tokio::fs::write(elsewhere.path().join("secret.txt"), b"s").await.unwrap();
    tokio::fs::create_dir(elsewhere.path().join("sub")).await.unwrap();
    tokio::fs::write(elsewhere.path().join("sub/keep.txt"), b"k").await.unwrap();

    let response = post_json(
        app.app(),
        "/api/v1/datasets/ingest",
        json!({
            "dataset_id": "ds1",
            "name": "ds1.zip",
            "data_type": "text",
            "client_id": "client-1",
            "extract_dir": elsewhere.path(),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(elsewhere.path().join("secret.txt").exists());
    assert!(elsewhere.path().join("sub/keep.txt").exists());
    let json = body_json(get(app.app(), "/api/v1/datasets/ds1/uploads").await).await;
    assert_eq!(json["data"]["pending"], 0);
}

#[tokio::test]
async fn ingest_with_blank_client_is_a_validation_error() {
    let app = TestApp::new(&["ann-1"]);
    let dir = app.extract("ds1", &[("a.txt", b"abc")]).await;

    let response = post_json(
        app.app(),
        "/api/v1/datasets/ingest",
        json!({
            "dataset_id": "ds1",
            "name": "ds1.zip",
            "data_type": "text",
            "client_id": " ",
            "extract_dir": dir,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Review listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn records_page_materializes_files_and_serves_them() {
    let app = TestApp::new(&["ann-1"]);
    ingest(&app, "ds1", &[("a.txt", b"abc"), ("b.txt", b"0123456789")]).await;
    app.drain_uploads().await;

    let response = get(app.app(), "/api/v1/datasets/ds1/records?annotator_id=ann-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let page = &json["data"];
    assert_eq!(page["total"], 2);
    assert_eq!(page["page"], 1);

    let records = page["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["name"], "a.txt");
    assert_eq!(records[1]["name"], "b.txt");

    let chunked_path = records[1]["served_path"].as_str().unwrap();
    assert_eq!(chunked_path, "/assembled-images/ds1/b.txt");
    let served = get(app.app(), chunked_path).await;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(body_bytes(served).await, b"0123456789");

    let whole_path = records[0]["served_path"].as_str().unwrap().to_string();
    let served = get(app.app(), &whole_path).await;
    assert_eq!(body_bytes(served).await, b"abc");
}

#[tokio::test]
async fn records_page_paginates_and_reports_totals() {
    let app = TestApp::new(&["ann-1"]);
    ingest(
        &app,
        "ds1",
        &[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")],
    )
    .await;
    app.drain_uploads().await;

    let response = get(app.app(), "/api/v1/datasets/ds1/records?page=2&limit=2").await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 3);
    assert_eq!(json["data"]["total_pages"], 2);
    assert_eq!(json["data"]["records"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn records_page_defaults_to_two_per_page() {
    let app = TestApp::new(&["ann-1"]);
    ingest(
        &app,
        "ds1",
        &[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")],
    )
    .await;
    app.drain_uploads().await;

    let json = body_json(get(app.app(), "/api/v1/datasets/ds1/records").await).await;
    assert_eq!(json["data"]["limit"], 2);
    assert_eq!(json["data"]["total_pages"], 2);
    assert_eq!(json["data"]["records"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn records_page_before_uploads_is_empty() {
    let app = TestApp::new(&["ann-1"]);
    ingest(&app, "ds1", &[("a.txt", b"abc")]).await;

    let response = get(app.app(), "/api/v1/datasets/ds1/records").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 0);
}

#[tokio::test]
async fn records_page_rejects_page_zero() {
    let app = TestApp::new(&["ann-1"]);

    let response = get(app.app(), "/api/v1/datasets/ds1/records?page=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Annotations and completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn annotation_updates_completion_counters() {
    let app = TestApp::new(&["ann-1"]);
    let report = ingest(&app, "ds1", &[("a.txt", b"a"), ("b.txt", b"b")]).await;
    let ids = record_ids(&report);

    let uri = format!("/api/v1/datasets/ds1/records/{}/annotations", ids[0]);
    let response = post_json(
        app.app(),
        &uri,
        json!({ "annotator_id": "ann-1", "annotations": [{ "label": "cat" }] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["completion_percent"], 50.0);
    assert_eq!(json["data"]["annotator_completed"], 1);

    let uri = format!("/api/v1/datasets/ds1/records/{}/annotations", ids[1]);
    let response = post_json(
        app.app(),
        &uri,
        json!({ "annotator_id": "ann-1", "annotations": "   " }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["completion_percent"], 50.0);

    let response = get(app.app(), "/api/v1/datasets/ds1/annotations").await;
    let json = body_json(response).await;
    let exported = json["data"].as_array().unwrap();
    assert_eq!(exported.len(), 2);
    assert_eq!(exported[0]["annotations"], r#"[{"label":"cat"}]"#);

    let response = get(app.app(), "/api/v1/datasets?annotator_id=ann-1").await;
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["assigned_records"], 2);
    assert_eq!(json["data"][0]["completed_records"], 1);
}

#[tokio::test]
async fn annotation_on_unknown_record_is_not_found() {
    let app = TestApp::new(&["ann-1"]);
    ingest(&app, "ds1", &[("a.txt", b"a")]).await;

    let response = post_json(
        app.app(),
        "/api/v1/datasets/ds1/records/missing/annotations",
        json!({ "annotator_id": "ann-1", "annotations": "x" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Classes, in-use flag, listing filters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn classes_are_split_from_the_dataset() {
    let app = TestApp::new(&["ann-1"]);
    ingest(&app, "ds1", &[("a.txt", b"a")]).await;

    let response = get(app.app(), "/api/v1/datasets/ds1/classes").await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["classes"], json!(["cat", "dog"]));
    assert_eq!(json["data"]["num_of_classes"], 2);

    let response = get(app.app(), "/api/v1/datasets/nope/classes").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn in_use_flag_round_trips() {
    let app = TestApp::new(&["ann-1"]);
    let report = ingest(&app, "ds1", &[("a.txt", b"a")]).await;
    let uri = format!("/api/v1/datasets/ds1/records/{}/in-use", record_ids(&report)[0]);

    let json = body_json(get(app.app(), &uri).await).await;
    assert_eq!(json["data"]["in_use"], false);

    let response = put_json(app.app(), &uri, json!({ "in_use": true })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(get(app.app(), &uri).await).await;
    assert_eq!(json["data"]["in_use"], true);
}

#[tokio::test]
async fn dataset_listing_requires_exactly_one_filter() {
    let app = TestApp::new(&[]);

    let response = get(app.app(), "/api/v1/datasets").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(app.app(), "/api/v1/datasets?client_id=c&annotator_id=a").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
