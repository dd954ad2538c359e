//! JSON-RPC 2.0 envelope: single requests, batches, and notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;

/// The set of `protocolVersion` strings GCB will negotiate.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &[
    "2025-11-25",
    "2025-06-18",
    "2025-03-26",
    "2024-11-05",
    "2024-10-07",
];

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent `id` marks this as a notification — no response element.
    #[serde(default)]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Either a single message or a batch array — the two shapes `POST
/// /gateway_ctx` accepts.
#[derive(Debug, Clone)]
pub enum RpcPayload {
    Single(JsonRpcRequest),
    Batch(Vec<JsonRpcRequest>),
}

/// Parse the raw request body, distinguishing an object from an array
/// before deserializing each element (so a malformed single element in
/// a batch doesn't abort the whole batch with a single parse error).
pub fn parse_payload(body: &Value) -> Result<RpcPayload, ()> {
    if body.is_array() {
        let items = body.as_array().ok_or(())?;
        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            parsed.push(serde_json::from_value(item.clone()).map_err(|_| ())?);
        }
        Ok(RpcPayload::Batch(parsed))
    } else {
        let req = serde_json::from_value(body.clone()).map_err(|_| ())?;
        Ok(RpcPayload::Single(req))
    }
}

/// Negotiate the MCP protocol version: `params.protocolVersion` if
/// supported, else the `MCP-Protocol-Version` request header if
/// supported, else the configured default.
pub fn negotiate_protocol_version(params_version: Option<&str>, header_version: Option<&str>, default: &str) -> String {
    if let Some(v) = params_version {
        if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) {
            return v.to_string();
        }
    }
    if let Some(v) = header_version {
        if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) {
            return v.to_string();
        }
    }
    default.to_string()
}
