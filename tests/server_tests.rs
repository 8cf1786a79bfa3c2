//! Integration tests for the HTTP surface.

#![cfg(all(feature = "server", feature = "sqlite"))]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use argus::server::{build_router, AppState, Database};
use argus::transport::Transport;

async fn setup_app() -> (axum::Router, AppState) {
    let db = Database::connect_sqlite("sqlite::memory:")
        .await
        .expect("failed to create database");
    db.ensure_schema().await.expect("failed to create schema");

    let state = AppState {
        db: Arc::new(db),
        transport: Arc::new(Transport::sim()),
    };
    (build_router(state.clone()), state)
}

async fn send_json(app: &axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request build failed");

    let response = app.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read failed");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("invalid JSON response")
    };
    (status, value)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request build failed");

    let response = app.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read failed");
    let value = serde_json::from_slice(&bytes).expect("invalid JSON response");
    (status, value)
}

#[tokio::test]
async fn account_crud_round_trip() {
    let (app, _state) = setup_app().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/accounts",
        json!({
            "account_number": "123456",
            "license": "PRO-01",
            "expire_date": "31/12/2567 22:00"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["success"].as_bool().unwrap());

    let (status, body) = get(&app, "/api/v1/accounts/123456").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account_number"], "123456");
    assert_eq!(body["status"], "valid");
    assert_eq!(body["notified"], false);

    let (status, body) = get(&app, "/api/v1/accounts?status=valid").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = get(&app, "/api/v1/accounts/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["by_status"]["valid"], 1);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let (app, _state) = setup_app().await;

    // Account numbers must be digit runs long enough for linking to match.
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/v1/accounts",
        json!({
            "account_number": "12ab",
            "license": "PRO-01",
            "expire_date": "31/12/2567"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/v1/accounts?status=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/v1/accounts/999999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_links_account_and_confirms() {
    let (app, state) = setup_app().await;

    send_json(
        &app,
        "POST",
        "/api/v1/accounts",
        json!({
            "account_number": "123456",
            "license": "PRO-01",
            "expire_date": "31/12/2599 23:59"
        }),
    )
    .await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/webhook",
        json!({
            "events": [{
                "sender_id": "U-sender-9",
                "text": "my account is 123456",
                "reply_token": "rt-1"
            }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["linked"], 1);

    let (_, account) = get(&app, "/api/v1/accounts/123456").await;
    assert_eq!(account["recipient_id"], "U-sender-9");

    let sim = state.transport.as_sim().unwrap();
    assert_eq!(sim.replied().len(), 1);
    assert_eq!(sim.replied()[0].to, "rt-1");
}

#[tokio::test]
async fn administrative_status_override() {
    let (app, _state) = setup_app().await;

    send_json(
        &app,
        "POST",
        "/api/v1/accounts",
        json!({
            "account_number": "123456",
            "license": "PRO-01",
            "expire_date": "31/12/2599"
        }),
    )
    .await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/v1/accounts/123456/status",
        json!({ "status": "suspended" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, account) = get(&app, "/api/v1/accounts/123456").await;
    assert_eq!(account["status"], "suspended");

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/v1/accounts/999999/status",
        json!({ "status": "suspended" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lapsed_query_reports_from_the_raw_date() {
    let (app, _state) = setup_app().await;

    // Raw date long past (Buddhist 2560 → 2017), status still `valid`
    // because no reconciliation cycle ran.
    send_json(
        &app,
        "POST",
        "/api/v1/accounts",
        json!({
            "account_number": "111111",
            "license": "PRO-01",
            "expire_date": "01/01/2560"
        }),
    )
    .await;
    send_json(
        &app,
        "POST",
        "/api/v1/accounts",
        json!({
            "account_number": "222222",
            "license": "PRO-01",
            "expire_date": "31/12/2599"
        }),
    )
    .await;

    let (status, body) = get(&app, "/api/v1/accounts/lapsed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["accounts"][0]["account_number"], "111111");
}

#[tokio::test]
async fn health_reports_backend() {
    let (app, _state) = setup_app().await;

    let (status, body) = get(&app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "argus");
    assert_eq!(body["database"]["db_type"], "sqlite");
}
