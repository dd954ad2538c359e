//! Upstream chat-completions dispatch: URL/header construction, a
//! streaming path that forwards SSE frames verbatim while accumulating
//! the assistant text for post-stream persistence, and a buffered
//! non-streaming path.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::GatewayError;
use crate::state::AppState;

/// `base` + `/v1/chat/completions` unless `base` already ends in
/// `/v1` (or a path already containing `/chat/completions`), in which
/// case only `/chat/completions` is appended.
pub fn build_upstream_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

fn build_headers(state: &AppState) -> Result<HeaderMap, GatewayError> {
    let api_key = state
        .config
        .require_upstream_api_key()
        .map_err(|e| GatewayError::Config(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| GatewayError::Internal(e.to_string()))?,
    );
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if !state.config.openrouter_http_referer.is_empty() {
        if let Ok(v) = HeaderValue::from_str(&state.config.openrouter_http_referer) {
            headers.insert("HTTP-Referer", v);
        }
    }
    if !state.config.openrouter_x_title.is_empty() {
        if let Ok(v) = HeaderValue::from_str(&state.config.openrouter_x_title) {
            headers.insert("X-Title", v);
        }
    }
    Ok(headers)
}

/// Dispatch a streaming request. Forwards every upstream SSE line
/// verbatim to the caller while a background task accumulates
/// `choices[0].delta.content` for post-stream persistence, per the
/// "second session" rule: persistence must not hold the client stream's
/// connection open.
pub async fn dispatch_streaming(state: &AppState, request_body: Value, session_id: String, user_text: String) -> Result<Response, GatewayError> {
    let url = build_upstream_url(&state.config.upstream_base_url);
    let headers = build_headers(state)?;

    let upstream_response = state
        .http
        .post(&url)
        .headers(headers)
        .json(&request_body)
        .send()
        .await
        .map_err(|e| GatewayError::UpstreamRetrieval(e.to_string()))?;

    if !upstream_response.status().is_success() {
        let status = StatusCode::from_u16(upstream_response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let body = upstream_response.text().await.unwrap_or_default();
        return Err(GatewayError::UpstreamLlm { status, body });
    }

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(32);
    let state = state_handle(state);

    tokio::spawn(async move {
        let mut byte_stream = upstream_response.bytes_stream();
        let mut pending = String::new();
        let mut accumulated = String::new();
        let mut saw_done = false;

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(_) => break,
            };
            if tx.send(Ok(chunk.clone())).await.is_err() {
                // Client disconnected; keep draining so the buffer we persist
                // reflects everything the upstream actually sent.
            }
            pending.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(line_end) = pending.find('\n') {
                let line = pending[..line_end].trim_end_matches('\r').to_string();
                pending.drain(..=line_end);
                if let Some(payload) = line.strip_prefix("data: ") {
                    if payload.trim() == "[DONE]" {
                        saw_done = true;
                        continue;
                    }
                    if let Ok(frame) = serde_json::from_str::<Value>(payload) {
                        if let Some(piece) = frame
                            .get("choices")
                            .and_then(|c| c.get(0))
                            .and_then(|c| c.get("delta"))
                            .and_then(|d| d.get("content"))
                            .and_then(|v| v.as_str())
                        {
                            accumulated.push_str(piece);
                        }
                    }
                }
            }
        }

        if !saw_done {
            let _ = tx.send(Ok(Bytes::from_static(b"data: [DONE]\n\n"))).await;
        }
        drop(tx);

        if !accumulated.is_empty() {
            if let Err(e) = state.turns.record_turn(&session_id, &user_text, &accumulated).await {
                tracing::warn!(error = %e, session_id = %session_id, "failed to persist streamed turn");
            }
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx));
    let mut response = Response::new(body);
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    Ok(response)
}

/// Clone the handle of shared state needed by the persistence task
/// without keeping the whole `AppState` (and its `reqwest::Client`)
/// alive past the point the streaming response is handed back.
fn state_handle(state: &AppState) -> PersistHandle {
    PersistHandle { turns: state.turns.clone() }
}

struct PersistHandle {
    turns: Arc<dyn context_core::summary::TurnSink>,
}

/// Dispatch a buffered (non-streaming) request. Applies the
/// tool-empty-content compat substitution, then persists the assistant
/// text if non-empty.
pub async fn dispatch_buffered(state: &AppState, request_body: Value, session_id: String, user_text: String) -> Result<Response, GatewayError> {
    let url = build_upstream_url(&state.config.upstream_base_url);
    let headers = build_headers(state)?;

    let upstream_response = state
        .http
        .post(&url)
        .headers(headers)
        .json(&request_body)
        .send()
        .await
        .map_err(|e| GatewayError::UpstreamRetrieval(e.to_string()))?;

    let status = upstream_response.status();

    if !status.is_success() {
        let axum_status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let body = upstream_response.text().await.unwrap_or_default();
        return Err(GatewayError::UpstreamLlm { status: axum_status, body });
    }

    let mut body: Value = upstream_response
        .json()
        .await
        .map_err(|e| GatewayError::UpstreamLlm { status: StatusCode::BAD_GATEWAY, body: e.to_string() })?;

    let mut assistant_text = String::new();
    if let Some(choice) = body.get_mut("choices").and_then(|c| c.get_mut(0)) {
        let finish_reason = choice.get("finish_reason").and_then(|v| v.as_str()).unwrap_or("").to_string();
        if let Some(message) = choice.get_mut("message") {
            let content_is_empty = message.get("content").and_then(|v| v.as_str()).map(str::is_empty).unwrap_or(false);
            let has_tool_calls = message
                .get("tool_calls")
                .and_then(|v| v.as_array())
                .map(|a| !a.is_empty())
                .unwrap_or(false);

            if finish_reason == "tool_calls" && has_tool_calls && content_is_empty && state.config.tool_empty_content_compat {
                if let Value::Object(map) = message {
                    map.insert("content".to_string(), json!(state.config.tool_empty_content_placeholder));
                }
            }

            assistant_text = message.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();
        }
    }

    if !assistant_text.is_empty() {
        if let Err(e) = state.turns.record_turn(&session_id, &user_text, &assistant_text).await {
            tracing::warn!(error = %e, session_id = %session_id, "failed to persist turn");
        }
    }

    let mut response = axum::Json(body).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
    Ok(response)
}
