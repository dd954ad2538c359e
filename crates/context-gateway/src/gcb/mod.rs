//! Gateway Context Builder (C5): a JSON-RPC 2.0 tool endpoint exposing
//! `initialize` / `tools/list` / `tools/call(gateway_ctx)`.

pub mod pipeline;
pub mod rpc;


use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::instrument;

use crate::state::AppState;
use pipeline::{run_pipeline, wrap_tool_result, GatewayCtxArgs};
use rpc::{negotiate_protocol_version, parse_payload, JsonRpcRequest, JsonRpcResponse, RpcPayload, METHOD_NOT_FOUND, PARSE_ERROR};

const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// `GET`/`OPTIONS /gateway_ctx` — a cheap liveness probe for MCP clients
/// doing discovery before a real JSON-RPC exchange.
#[instrument(skip(state))]
pub async fn discovery_handler(State(state): State<AppState>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        MCP_PROTOCOL_VERSION_HEADER,
        HeaderValue::from_str(&state.config.mcp_protocol_version_default)
            .unwrap_or(HeaderValue::from_static("2025-06-18")),
    );
    (
        StatusCode::OK,
        headers,
        Json(json!({ "ok": true, "name": "gateway_ctx", "mcp": true })),
    )
        .into_response()
}

/// `POST /gateway_ctx` — single JSON-RPC message or batch array.
#[instrument(skip(state, headers, body))]
pub async fn rpc_handler(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let header_version = headers
        .get(MCP_PROTOCOL_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let payload = match parse_payload(&body) {
        Ok(p) => p,
        Err(()) => {
            let resp = JsonRpcResponse::err(Value::Null, PARSE_ERROR, "Parse error");
            return respond(StatusCode::OK, &state.config.mcp_protocol_version_default, Json(resp));
        }
    };

    match payload {
        RpcPayload::Single(req) => {
            let negotiated = negotiate_request_version(&req, header_version.as_deref(), &state.config.mcp_protocol_version_default);
            match dispatch(&state, &req).await {
                Some(resp) => respond(StatusCode::OK, &negotiated, Json(resp)),
                None => respond(StatusCode::NO_CONTENT, &negotiated, Json(Value::Null)),
            }
        }
        RpcPayload::Batch(requests) => {
            // Open Question decision: one negotiated version for the whole batch.
            let negotiated = requests
                .first()
                .map(|r| negotiate_request_version(r, header_version.as_deref(), &state.config.mcp_protocol_version_default))
                .unwrap_or_else(|| state.config.mcp_protocol_version_default.clone());

            let mut responses = Vec::new();
            for req in &requests {
                if let Some(resp) = dispatch(&state, req).await {
                    responses.push(resp);
                }
            }
            if responses.is_empty() {
                respond(StatusCode::NO_CONTENT, &negotiated, Json(Value::Null))
            } else {
                respond(StatusCode::OK, &negotiated, Json(responses))
            }
        }
    }
}

fn negotiate_request_version(req: &JsonRpcRequest, header_version: Option<&str>, default: &str) -> String {
    let params_version = req.params.get("protocolVersion").and_then(|v| v.as_str());
    negotiate_protocol_version(params_version, header_version, default)
}

fn respond(status: StatusCode, protocol_version: &str, body: impl IntoResponse) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        MCP_PROTOCOL_VERSION_HEADER,
        HeaderValue::from_str(protocol_version).unwrap_or(HeaderValue::from_static("2025-06-18")),
    );
    (status, headers, body).into_response()
}

/// Dispatch one JSON-RPC message. Returns `None` for notifications.
async fn dispatch(state: &AppState, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    let id = req.id.clone();
    let result = match req.method.as_str() {
        "initialize" => Ok(handle_initialize(state, &req.params)),
        "tools/list" => Ok(handle_tools_list()),
        "tools/call" => handle_tools_call(state, &req.params).await,
        _ => Err((METHOD_NOT_FOUND, format!("method not found: {}", req.method))),
    };

    if req.is_notification() {
        return None;
    }
    let id = id.unwrap_or(Value::Null);
    Some(match result {
        Ok(value) => JsonRpcResponse::ok(id, value),
        Err((code, message)) => JsonRpcResponse::err(id, code, message),
    })
}

fn handle_initialize(state: &AppState, params: &Value) -> Value {
    let params_version = params.get("protocolVersion").and_then(|v| v.as_str());
    let negotiated = negotiate_protocol_version(params_version, None, &state.config.mcp_protocol_version_default);
    json!({
        "protocolVersion": negotiated,
        "serverInfo": { "name": "gateway_ctx", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "tools": {} },
    })
}

fn handle_tools_list() -> Value {
    json!({
        "tools": [{
            "name": "gateway_ctx",
            "description": "Resolve retrieval keyword, run the two-phase anchor retrieval policy, and return ranked evidence with an anchor snippet.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "keyword": { "type": "string" },
                    "text": { "type": "string" },
                    "user": { "type": "string" },
                    "summaries": { "type": "object" },
                },
                "required": ["keyword"],
            },
        }],
    })
}

async fn handle_tools_call(state: &AppState, params: &Value) -> Result<Value, (i64, String)> {
    let name = params.get("name").and_then(|v| v.as_str()).unwrap_or_default();
    if name != "gateway_ctx" {
        return Err((METHOD_NOT_FOUND, format!("unknown tool: {name}")));
    }
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
    let args = GatewayCtxArgs::from_value(&arguments, &state.config.gateway_ctx_user);
    let outcome = run_pipeline(state, args).await;
    Ok(wrap_tool_result(&outcome))
}
