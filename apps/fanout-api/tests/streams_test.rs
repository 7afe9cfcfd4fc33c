mod common;

use axum::http::StatusCode;
use axum_test::TestServer;

// ---------------------------------------------------------------------------
// POST /streams/:stream_name/records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn put_records_assigns_sequence_numbers() {
    let (app, _state, _registry) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post(&format!("/streams/{}/records", common::TEST_STREAM))
        .json(&serde_json::json!({
            "records": [
                { "partition_key": "call-1", "data": { "status": "ringing" } },
                { "partition_key": "call-1", "data_base64": "eyJzdGF0dXMiOiJlbmRlZCJ9" }
            ]
        }))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["stream_name"], common::TEST_STREAM);
    let seqs: Vec<u64> = body["sequence_numbers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap().parse().unwrap())
        .collect();
    assert_eq!(seqs.len(), 2);
    assert!(seqs[1] > seqs[0]);
}

#[tokio::test]
async fn unknown_stream_is_404() {
    let (app, _state, _registry) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/streams/other-stream/records")
        .json(&serde_json::json!({
            "records": [ { "partition_key": "k", "data": {} } ]
        }))
        .await;

    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_record_list_is_rejected() {
    let (app, _state, _registry) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post(&format!("/streams/{}/records", common::TEST_STREAM))
        .json(&serde_json::json!({ "records": [] }))
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn record_must_carry_exactly_one_payload() {
    let (app, _state, _registry) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let both = server
        .post(&format!("/streams/{}/records", common::TEST_STREAM))
        .json(&serde_json::json!({
            "records": [ { "partition_key": "k", "data": {}, "data_base64": "e30=" } ]
        }))
        .await;
    both.assert_status(StatusCode::BAD_REQUEST);

    let neither = server
        .post(&format!("/streams/{}/records", common::TEST_STREAM))
        .json(&serde_json::json!({ "records": [ { "partition_key": "k" } ] }))
        .await;
    neither.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_base64_is_rejected_before_append() {
    let (app, _state, _registry) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post(&format!("/streams/{}/records", common::TEST_STREAM))
        .json(&serde_json::json!({
            "records": [
                { "partition_key": "k", "data": {} },
                { "partition_key": "k", "data_base64": "%%%" }
            ]
        }))
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("records[1].data_base64"));
}
