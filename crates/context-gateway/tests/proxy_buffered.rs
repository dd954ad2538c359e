//! `POST /v1/chat/completions` (non-streaming) — the tool-empty-content
//! compat substitution.

mod common;

use axum::body::Body;
use axum::http::Request;
use context_core::config::AppConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

#[tokio::test]
async fn empty_content_with_tool_calls_is_replaced_by_the_configured_placeholder() {
    let upstream_response = json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "finish_reason": "tool_calls",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "lookup", "arguments": "{}" },
                }],
            },
        }],
    });
    let upstream_base = common::spawn_upstream_mock_buffered(upstream_response).await;

    let mut config = AppConfig::default();
    config.upstream_base_url = upstream_base;
    config.upstream_api_key = "test-upstream-key".to_string();
    config.anchor_inject_enabled = false;
    assert!(config.tool_empty_content_compat);
    let placeholder = config.tool_empty_content_placeholder.clone();
    let (state, turns) = common::test_state(config);
    let app = context_gateway::build_router(state);

    let body = json!({
        "model": "test-model",
        "stream": false,
        "messages": [{ "role": "user", "content": "帮我查一下" }],
    });
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap();

    let message = &parsed["choices"][0]["message"];
    assert_eq!(message["content"], placeholder);
    assert_eq!(message["tool_calls"][0]["id"], "call_1");

    let recorded = turns.turns.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].2, placeholder);
}
