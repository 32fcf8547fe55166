//! HTTP routes over a scripted node.

#![cfg(feature = "server")]

mod common;

use alpha_dashboard::{create_router, BitcoinService, DashboardState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;

fn app(rpc: Arc<MockRpc>) -> (Arc<BitcoinService>, Router) {
    let config = test_config();
    let service = BitcoinService::with_rpc(rpc, &config);
    let state = Arc::new(RwLock::new(DashboardState::new(&config.display)));
    let router = create_router(service.clone(), state);
    (service, router)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_connection_flags() {
    let (_, router) = app(Arc::new(MockRpc::new()));
    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "alpha-dashboard");
    assert_eq!(body["connected"], false);
}

#[tokio::test]
async fn status_serves_idle_state() {
    let (_, router) = app(Arc::new(MockRpc::new()));
    let (status, body) = send(&router, get("/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], false);
    assert!(body.get("block_hashes").is_none());
}

#[tokio::test]
async fn address_add_list_delete() {
    let (service, router) = app(Arc::new(MockRpc::new()));

    let (status, body) = send(&router, post_json("/addresses", json!({"address": SEGWIT_ADDR}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"address": SEGWIT_ADDR, "added": true}));
    assert_eq!(service.monitored_addresses(), vec![SEGWIT_ADDR.to_string()]);

    let (_, body) = send(&router, post_json("/addresses", json!({"address": SEGWIT_ADDR}))).await;
    assert_eq!(body["added"], false);

    let (status, body) = send(&router, get("/addresses")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["addresses"][0]["address"], SEGWIT_ADDR);
    assert_eq!(body["addresses"][0]["slow"], false);

    let (status, _) = send(&router, delete(&format!("/addresses/{}", SEGWIT_ADDR))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(service.monitored_addresses().is_empty());
}

#[tokio::test]
async fn deleting_unknown_address_is_not_found() {
    let (_, router) = app(Arc::new(MockRpc::new()));
    let (status, _) = send(&router, delete(&format!("/addresses/{}", P2SH_ADDR))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_address_is_bad_request() {
    let (service, router) = app(Arc::new(MockRpc::new()));
    let (status, _) = send(&router, post_json("/addresses", json!({"address": "not-an-address"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(service.monitored_addresses().is_empty());
}

#[tokio::test]
async fn refresh_while_offline_is_unavailable() {
    let rpc = Arc::new(MockRpc::new());
    let (_, router) = app(rpc.clone());
    let (status, _) = send(&router, post_json("/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(rpc.calls().is_empty());
}

#[tokio::test]
async fn refresh_when_connected_reports_counts() {
    let rpc = Arc::new(MockRpc::healthy());
    rpc.always("scantxoutset", Ok(scan_result(100, &[("aa", 0.1, 90)])));
    let (service, router) = app(rpc.clone());
    service.connect_to_node().await.expect("connect");
    service.add_address_to_monitor(SEGWIT_ADDR).await.expect("add");

    let (status, body) = send(&router, post_json("/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"refreshed": 1, "poll_error": null}));
}
