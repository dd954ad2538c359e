//! `POST /v1/chat/completions` (streaming) — SSE frames are forwarded
//! verbatim and, after the stream closes, the assembled assistant text
//! is persisted exactly once.

mod common;

use axum::body::Body;
use axum::http::Request;
use context_core::config::AppConfig;
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

const SSE_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"你好\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"，\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"世界\"}}]}\n\n\
data: [DONE]\n\n";

#[tokio::test]
async fn streamed_frames_are_forwarded_verbatim_and_the_turn_is_persisted_once() {
    let upstream_base = common::spawn_upstream_mock_stream(SSE_BODY).await;

    let mut config = AppConfig::default();
    config.upstream_base_url = upstream_base;
    config.upstream_api_key = "test-upstream-key".to_string();
    config.anchor_inject_enabled = false;
    let (state, turns) = common::test_state(config);
    let app = context_gateway::build_router(state);

    let body = json!({
        "model": "test-model",
        "stream": true,
        "messages": [{ "role": "user", "content": "你好" }],
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
    let forwarded = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(forwarded, SSE_BODY);

    let recorded = common::wait_until(|| {
        let turns = turns.turns.lock().unwrap();
        turns.first().cloned()
    })
    .await;
    assert_eq!(recorded.2, "你好，世界");
}
