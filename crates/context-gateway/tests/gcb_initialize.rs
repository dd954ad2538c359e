//! `POST /gateway_ctx` — `initialize` protocol-version negotiation and
//! the JSON-RPC notification contract.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use context_core::config::AppConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn initialize_negotiates_the_requested_protocol_version() {
    let (state, _turns) = common::test_state(AppConfig::default());
    let app = context_gateway::build_router(state);

    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": { "protocolVersion": "2025-06-18" },
    });

    let request = Request::builder()
        .method("POST")
        .uri("/gateway_ctx")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let header = response
        .headers()
        .get("MCP-Protocol-Version")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert_eq!(header, "2025-06-18");

    let parsed = response_json(response).await;
    assert_eq!(parsed["result"]["protocolVersion"], "2025-06-18");
}

#[tokio::test]
async fn unsupported_protocol_version_falls_back_to_default() {
    let (state, _turns) = common::test_state(AppConfig::default());
    let app = context_gateway::build_router(state);

    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": { "protocolVersion": "1999-01-01" },
    });
    let request = Request::builder()
        .method("POST")
        .uri("/gateway_ctx")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let parsed = response_json(response).await;
    assert_eq!(parsed["result"]["protocolVersion"], AppConfig::default().mcp_protocol_version_default);
}

#[tokio::test]
async fn notification_without_id_produces_no_response_body() {
    let (state, _turns) = common::test_state(AppConfig::default());
    let app = context_gateway::build_router(state);

    let body = json!({ "jsonrpc": "2.0", "method": "tools/list" });
    let request = Request::builder()
        .method("POST")
        .uri("/gateway_ctx")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn batch_notification_is_omitted_from_the_result_array() {
    let (state, _turns) = common::test_state(AppConfig::default());
    let app = context_gateway::build_router(state);

    let body = json!([
        { "jsonrpc": "2.0", "method": "tools/list" },
        { "jsonrpc": "2.0", "id": 7, "method": "tools/list" },
    ]);
    let request = Request::builder()
        .method("POST")
        .uri("/gateway_ctx")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = response_json(response).await;
    let array = parsed.as_array().unwrap();
    assert_eq!(array.len(), 1);
    assert_eq!(array[0]["id"], 7);
}
