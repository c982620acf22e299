//! Router tests: requests go through the axum router with
//! `tower::ServiceExt::oneshot`, the way a client would see them.

#![allow(clippy::panic)]

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use setlist_gateway::api;

use common::{Harness, harness};

fn router(h: &Harness) -> Router {
    api::build_router().with_state(h.state.clone())
}

async fn call(h: &Harness, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    };
    let Ok(request) = request else {
        panic!("request should build");
    };
    let Ok(response) = router(h).oneshot(request).await else {
        panic!("router should respond");
    };
    let status = response.status();
    let Ok(bytes) = to_bytes(response.into_body(), 1 << 20).await else {
        panic!("body should read");
    };
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn scan(h: &Harness, session_id: &str, requester: &str) -> Value {
    let (status, body) = call(
        h,
        Method::POST,
        "/api/v1/tenants/roberto/scan",
        Some(json!({ "session": { "session_id": session_id }, "requester": requester })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["session"].clone()
}

#[tokio::test]
async fn health_reports_store_backend() {
    let h = harness().await;
    let (status, body) = call(&h, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory: ok");
}

#[tokio::test]
async fn unknown_tenant_is_404() {
    let h = harness().await;
    let (status, body) = call(&h, Method::GET, "/api/v1/tenants/nobody/queue", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2004);
}

#[tokio::test]
async fn scan_submit_and_queue() {
    let h = harness().await;
    let (status, gig) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/gig/start",
        Some(json!({ "name": "Friday", "tip_enabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(gig["name"], "Friday");
    assert_eq!(gig["is_active"], true);

    let session = scan(&h, "browser-1", "Alice").await;
    assert_eq!(session["requester"], "Alice");
    assert_eq!(session["gig_id"], gig["id"]);

    let (status, body) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/requests",
        Some(json!({ "session": session, "song_id": h.song(0).id, "tip_amount": 5.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["queue_position"], 1);
    assert_eq!(body["request"]["requester"], "Alice");
    assert_eq!(body["tip_intent"]["amount_minor"], 500);
    assert_eq!(body["tip_intent"]["status"], "pending");

    let (status, queue) = call(&h, Method::GET, "/api/v1/tenants/roberto/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue["data"][0]["title"], "Wonderwall");
    assert_eq!(queue["data"][0]["requesters"][0], "Alice");
    assert_eq!(queue["data"][0]["tip_total"], 500);

    let (status, ids) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/queue/mine/song-ids",
        Some(json!({ "session": session })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids["song_ids"], json!([h.song(0).id]));
}

#[tokio::test]
async fn gig_change_asks_for_rescan() {
    let h = harness().await;
    h.start_gig(true).await;
    let session = scan(&h, "browser-2", "Bob").await;
    h.start_gig(true).await;

    let (status, body) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/requests",
        Some(json!({ "session": session, "song_id": h.song(0).id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 2003);
    assert_eq!(body["error"]["details"], "rescan");

    let (status, check) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/session/check",
        Some(json!({ "session": session })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["valid"], true);
    assert_eq!(check["bound"], false);
    assert_eq!(check["rescan_required"], true);
}

#[tokio::test]
async fn admission_errors_map_to_codes() {
    let h = harness().await;
    h.start_gig(true).await;
    let session = scan(&h, "browser-3", "Carol").await;

    let (status, body) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/requests",
        Some(json!({ "session": session, "song_id": h.song(0).id, "tip_amount": 0.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], 4004);

    let (status, _) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/requests",
        Some(json!({ "session": session, "song_id": h.song(0).id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/requests",
        Some(json!({ "session": session, "song_id": h.song(0).id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 4002);

    let (status, body) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/requests",
        Some(json!({ "session": { "session_id": "anon", "last_activity": session["last_activity"], "tenant_id": session["tenant_id"], "gig_id": session["gig_id"] }, "song_id": h.song(1).id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1002);
}

#[tokio::test]
async fn performer_settings_and_played() {
    let h = harness().await;
    let (status, body) = call(
        &h,
        Method::PUT,
        "/api/v1/tenants/roberto/settings/max-requests",
        Some(json!({ "max_requests": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);

    let (status, body) = call(
        &h,
        Method::PUT,
        "/api/v1/tenants/roberto/settings/max-requests",
        Some(json!({ "max_requests": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["max_requests"], 5);

    let (_, body) = call(
        &h,
        Method::GET,
        "/api/v1/tenants/roberto/settings/max-requests",
        None,
    )
    .await;
    assert_eq!(body["max_requests"], 5);

    h.start_gig(true).await;
    let session = scan(&h, "browser-4", "Dana").await;
    let (_, submitted) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/requests",
        Some(json!({ "session": session, "song_id": h.song(2).id })),
    )
    .await;
    let Some(request_id) = submitted["request"]["id"].as_i64() else {
        panic!("request id expected");
    };

    let uri = format!("/api/v1/requests/{request_id}/played");
    let (status, body) = call(&h, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    let (_, body) = call(&h, Method::POST, &uri, None).await;
    assert_eq!(body["changed"], false);

    let (status, body) = call(&h, Method::DELETE, "/api/v1/tenants/roberto/requests", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn tip_capture_over_http() {
    let h = harness().await;
    h.start_gig(true).await;
    let session = scan(&h, "browser-5", "Eve").await;

    let (status, tip) = call(
        &h,
        Method::POST,
        "/api/v1/tenants/roberto/tips",
        Some(json!({ "session": session, "amount": 3.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (Some(id), Some(order_id)) = (tip["id"].as_i64(), tip["provider_payment_id"].as_str()) else {
        panic!("tip intent with order expected: {tip}");
    };

    let (status, order) = call(&h, Method::POST, &format!("/api/v1/tips/{id}/order"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_id"], order_id);
    assert_eq!(order["created"], false);

    let capture_uri = format!("/api/v1/tips/{id}/capture");
    let (status, body) = call(
        &h,
        Method::POST,
        &capture_uri,
        Some(json!({ "order_id": "WRONG" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], 4005);

    let (status, body) = call(
        &h,
        Method::POST,
        &capture_uri,
        Some(json!({ "order_id": order_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"]["status"], "completed");

    let (status, body) = call(
        &h,
        Method::POST,
        &capture_uri,
        Some(json!({ "order_id": order_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 4006);
}

#[tokio::test]
async fn gig_info_and_announcement() {
    let h = harness().await;
    let (_, info) = call(&h, Method::GET, "/api/v1/tenants/roberto/gig", None).await;
    assert_eq!(info["gig"], Value::Null);
    assert_eq!(info["payment"]["client_id"], "client");
    assert_eq!(info["payment"]["mode"], "sandbox");

    let gig = h.start_gig(true).await;
    let uri = format!("/api/v1/gigs/{}/announcement", gig.id);
    let (status, body) = call(
        &h,
        Method::PUT,
        &uri,
        Some(json!({ "announcement": "  Last song in 5 minutes  " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["announcement"], "Last song in 5 minutes");

    let (_, info) = call(&h, Method::GET, "/api/v1/tenants/roberto/gig", None).await;
    assert_eq!(info["announcement"], "Last song in 5 minutes");
    assert_eq!(info["tip_enabled"], true);
    assert_eq!(info["min_tip"], 100);

    let (status, body) = call(&h, Method::POST, "/api/v1/tenants/roberto/gig/end", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], true);

    let (status, _) = call(&h, Method::PUT, &uri, Some(json!({ "announcement": "late" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
