mod utils;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use utils::create_test_app;
use uuid::Uuid;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, parsed)
}

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn create_payload(initial_signature: Option<&str>) -> Value {
    json!({
        "destination_address": "0x123",
        "amount": "100",
        "asset_id": Uuid::new_v4(),
        "blockchain_id": Uuid::new_v4(),
        "source_address_id": Uuid::new_v4(),
        "initial_signature": initial_signature
    })
}

#[tokio::test]
async fn test_post_valid_withdrawal() {
    let (_, app) = create_test_app();

    let (status, body) = send(
        &app,
        json_request("POST", "/withdrawals", create_payload(Some("Signature1"))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("withdrawal_id").is_some());
    assert!(body.get("version_timestamp").is_some());
    assert_eq!(body["required_signatures"], 1);
    assert_eq!(body["state"], "READY");
    assert_eq!(body["ledger"][0]["signatures"], json!(["Signature1"]));
    assert_eq!(body["ledger"][0]["broadcast_status"], "NOT_BROADCAST");
}

#[tokio::test]
async fn test_post_invalid_withdrawal() {
    let (store, app) = create_test_app();

    let mut payload = create_payload(None);
    payload["amount"] = json!("-10");
    let (status, _) = send(&app, json_request("POST", "/withdrawals", payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.withdrawal_count().await, 0);
}

#[tokio::test]
async fn test_patch_appends_and_rejects_stale_version() {
    let (_, app) = create_test_app();
    let (_, created) = send(
        &app,
        json_request("POST", "/withdrawals", create_payload(Some("Signature1"))),
    )
    .await;
    let uri = format!("/withdrawals/{}", created["withdrawal_id"].as_str().unwrap());
    let update = json!({
        "version_timestamp": created["version_timestamp"],
        "signatures": ["SIG2", "SIG3", "SIG4"],
        "broadcast_status": "NO",
        "tx_hash": "txHASH",
        "remarks": "Remarks"
    });

    let (status, updated) = send(&app, json_request("PATCH", &uri, update.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["ledger"].as_array().unwrap().len(), 2);
    assert_eq!(
        updated["ledger"][1]["signatures"],
        json!(["Signature1", "SIG2", "SIG3", "SIG4"])
    );
    assert_eq!(updated["ledger"][1]["tx_hash"], "txHASH");
    assert_eq!(updated["ledger"][1]["tx_payload"], Value::Null);
    assert_ne!(updated["version_timestamp"], created["version_timestamp"]);

    let (status, _) = send(&app, json_request("PATCH", &uri, update)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_patch_unknown_withdrawal() {
    let (_, app) = create_test_app();

    let uri = format!("/withdrawals/{}", Uuid::new_v4());
    let (status, _) = send(
        &app,
        json_request(
            "PATCH",
            &uri,
            json!({
                "version_timestamp": "2025-01-01T00:00:00Z",
                "signatures": ["SIG2"],
                "broadcast_status": "NO"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_withdrawal_by_id() {
    let (_, app) = create_test_app();
    let (_, created) = send(
        &app,
        json_request("POST", "/withdrawals", create_payload(None)),
    )
    .await;
    let id = created["withdrawal_id"].as_str().unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/withdrawals/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["withdrawal_id"], id);
    assert_eq!(body["state"], "CREATED");
    assert_eq!(body["ledger"][0]["signatures"], json!([]));
}

#[tokio::test]
async fn test_search_withdrawals() {
    let (_, app) = create_test_app();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, created) = send(
            &app,
            json_request("POST", "/withdrawals", create_payload(None)),
        )
        .await;
        ids.push(created["withdrawal_id"].as_str().unwrap().to_string());
    }

    let request = Request::builder()
        .method("GET")
        .uri(format!(
            "/withdrawals?withdrawal_ids={},{}&limit=1&order=desc",
            ids[0], ids[2]
        ))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    let page = body["withdrawals"].as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["withdrawal_id"], ids[2].as_str());

    let bad = Request::builder()
        .method("GET")
        .uri("/withdrawals?asset_ids=not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
