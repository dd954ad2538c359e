//! `tools/call gateway_ctx` — garbled-keyword repair, cache warm/hit,
//! and the primary-miss/fallback-hit retrieval policy, driven through
//! the real JSON-RPC endpoint against a mocked Dify workflow.

mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::http::Request;
use context_core::config::AppConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn gateway_ctx_call(id: i64, keyword: &str, text: &str, user: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {
            "name": "gateway_ctx",
            "arguments": { "keyword": keyword, "text": text, "user": user },
        },
    })
}

async fn call(app: &axum::Router, body: Value) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri("/gateway_ctx")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn garbled_keyword_is_repaired_from_free_text() {
    let (run_url, _calls) = common::spawn_dify_mock(HashMap::from([(
        "我想聊聊猫咪".to_string(),
        ("今天也要乖乖喝水喵".to_string(), String::new()),
    )]))
    .await;

    let mut config = AppConfig::default();
    config.dify_api_key = "test-key".to_string();
    config.dify_workflow_run_url = run_url;
    let (state, _turns) = common::test_state(config);
    let app = context_gateway::build_router(state);

    let resp = call(&app, gateway_ctx_call(1, "??,???", "我想聊聊猫咪", "tester")).await;
    let data = &resp["result"]["data"];
    assert!(data["keyword_primary"].as_str().unwrap().contains("猫咪"));
    assert_eq!(data["keyword_primary"], data["keyword_used"]);
}

#[tokio::test]
async fn repeated_call_within_ttl_is_served_from_cache() {
    let (run_url, calls) = common::spawn_dify_mock(HashMap::from([(
        "工作,加班".to_string(),
        ("先喝口水，慢慢说。".to_string(), String::new()),
    )]))
    .await;

    let mut config = AppConfig::default();
    config.dify_api_key = "test-key".to_string();
    config.dify_workflow_run_url = run_url;
    let (state, _turns) = common::test_state(config);
    let app = context_gateway::build_router(state);

    let first = call(&app, gateway_ctx_call(1, "工作,加班", "今天工作好累啊要加班", "tester")).await;
    assert_eq!(first["result"]["data"]["cache_hit"], false);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let second = call(&app, gateway_ctx_call(2, "工作,加班", "今天工作好累啊要加班", "tester")).await;
    assert_eq!(second["result"]["data"]["cache_hit"], true);
    assert_eq!(second["result"]["data"]["cache_miss_reason"], "bypassed");
    assert_eq!(second["result"]["data"]["ctx"], first["result"]["data"]["ctx"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "second call must not re-query the RAG workflow");
}

#[tokio::test]
async fn primary_miss_falls_back_to_the_emotional_pair() {
    let (run_url, _calls) = common::spawn_dify_mock(HashMap::from([(
        "哥哥,小猫咪".to_string(),
        ("乖，哥哥在呢。".to_string(), String::new()),
    )]))
    .await;

    let mut config = AppConfig::default();
    config.dify_api_key = "test-key".to_string();
    config.dify_workflow_run_url = run_url;
    let (state, _turns) = common::test_state(config);
    let app = context_gateway::build_router(state);

    let resp = call(&app, gateway_ctx_call(1, "哥哥,撒娇", "哥哥抱抱我嘛，今天好想你喵", "tester")).await;
    let data = &resp["result"]["data"];
    assert_eq!(data["keyword_used"], "哥哥,小猫咪");
    assert!(data["ms_dify_used"].is_i64());
}
