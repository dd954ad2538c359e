//! Proxy Orchestrator (C6): the OpenAI-compatible `/v1/chat/completions`
//! handler — identity resolution, tool-thread sanitization, summary
//! load, keyword extraction, an in-process Gateway Context Builder
//! call, system-block injection, and upstream dispatch.

pub mod identity;
pub mod keyword_extract;
pub mod sanitize;
pub mod system_blocks;
pub mod upstream;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::GatewayError;
use crate::gcb::pipeline::{run_pipeline, GatewayCtxArgs, PipelineOutcome};
use crate::state::AppState;
use identity::resolve_identity;

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn last_user_text(messages: &[Value]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(|v| v.as_str()) == Some("user"))
        .and_then(|m| m.get("content").and_then(|v| v.as_str()))
        .unwrap_or_default()
        .to_string()
}

/// `POST /v1/chat/completions`.
#[instrument(skip(state, headers, body), fields(model = tracing::field::Empty))]
pub async fn chat_completions(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    match handle(&state, &headers, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle(state: &AppState, headers: &HeaderMap, mut body: Value) -> Result<Response, GatewayError> {
    let config = &state.config;
    let now = now_unix();

    let metadata = body.get("metadata").cloned().unwrap_or(json!({}));
    let identity = resolve_identity(headers, &metadata, now, &config.memory_id_default, &config.agent_id_default);

    let messages = body
        .get("messages")
        .and_then(|v| v.as_array())
        .cloned()
        .ok_or_else(|| GatewayError::InvalidRequest("messages must be an array".to_string()))?;

    let sanitized = sanitize::sanitize_messages(&messages, &body);
    let user_text = last_user_text(&sanitized);

    let (s4, s60) = state.summaries.latest_summaries(&identity.session_id).await;

    let mut anchor_snippet = String::new();
    let mut keyword_used = String::new();
    if config.anchor_inject_enabled && config.force_gateway_every_turn {
        let keyword = keyword_extract::extract_keyword(&user_text);
        let args = GatewayCtxArgs {
            keyword,
            text: user_text.clone(),
            user: config.gateway_ctx_user.clone(),
            s4: s4.as_ref().map(summary_to_fact_block),
            s60: s60.as_ref().map(summary_to_fact_block),
        };
        if let PipelineOutcome::Ok(result) = run_pipeline(state, args).await {
            anchor_snippet = result.get("ctx").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            keyword_used = result.get("keyword_used").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        }
    }

    let system_block = system_blocks::build_system_block(
        s4.as_ref().map(summary_to_fact_block).as_ref(),
        s60.as_ref().map(summary_to_fact_block).as_ref(),
        &anchor_snippet,
        &metadata,
    );

    let mut final_messages = sanitized;
    system_blocks::inject_system_message(&mut final_messages, system_block);

    if let Value::Object(ref mut map) = body {
        map.insert("messages".to_string(), json!(final_messages));
    }

    let stream = body.get("stream").and_then(|v| v.as_bool()).unwrap_or(false);

    let mut response = if stream {
        upstream::dispatch_streaming(state, body, identity.session_id.clone(), user_text.clone()).await?
    } else {
        upstream::dispatch_buffered(state, body, identity.session_id.clone(), user_text.clone()).await?
    };

    attach_observability_headers(&mut response, config, &identity, &upstream::build_upstream_url(&config.upstream_base_url), &user_text, &keyword_used);

    Ok(response)
}

fn summary_to_fact_block(summary: &context_core::summary::Summary) -> context_core::evidence::SummaryFactBlock {
    context_core::evidence::SummaryFactBlock {
        summary: json!({
            "goal": summary.summary.goal,
            "state": summary.summary.state,
            "open_loops": summary.summary.open_loops,
            "constraints": summary.summary.constraints,
            "tone_notes": summary.summary.tone_notes,
        }),
        created_at: Some(summary.created_at.clone()),
    }
}

fn attach_observability_headers(
    response: &mut Response,
    config: &context_core::config::AppConfig,
    identity: &identity::Identity,
    upstream_url: &str,
    user_text: &str,
    keyword_used: &str,
) {
    let headers = response.headers_mut();
    let insert = |headers: &mut HeaderMap, name: &'static str, value: &str| {
        if let Ok(v) = HeaderValue::from_str(value) {
            headers.insert(name, v);
        }
    };
    insert(headers, "x-upstream-url", upstream_url);
    insert(headers, "x-thread-id", &identity.thread_id);
    insert(headers, "x-memory-id", &identity.memory_id);
    insert(headers, "x-agent-id", &identity.agent_id);
    insert(headers, "x-s4-scope", &identity.s4_scope);
    insert(headers, "x-session-id", &identity.session_id);

    if config.openai_proxy_debug_echo {
        let preview: String = user_text.chars().take(120).collect();
        let hex: String = preview.bytes().map(|b| format!("{b:02x}")).collect();
        insert(headers, "x-debug-user-preview", &preview);
        insert(headers, "x-debug-user-hex", &hex);
        insert(headers, "x-debug-keyword-used", keyword_used);
    }
}
