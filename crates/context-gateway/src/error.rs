//! Gateway error taxonomy (see the error-handling design's six
//! categories: client protocol, config, upstream retrieval, upstream
//! LLM, decode failure, persistence failure).

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub const GATEWAY_STATUS_HEADER: &str = "x-gateway-status";

/// Errors surfaced by the HTTP layer. `ClientProtocolError` is handled
/// inline as a JSON-RPC error object (not via this enum) since its shape
/// differs from a plain HTTP error body; everything reaching this type
/// maps to a conventional HTTP response.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing bearer credentials for an external collaborator.
    #[error("configuration error: {0}")]
    Config(String),

    /// The RAG workflow timed out or returned a non-2xx status.
    #[error("retrieval error: {0}")]
    UpstreamRetrieval(String),

    /// The upstream chat-completions provider returned a non-2xx status.
    #[error("upstream error ({status}): {body}")]
    UpstreamLlm { status: StatusCode, body: String },

    /// The client sent a malformed request body.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::UpstreamLlm { status, body } = &self {
            // Forward-with-status-code: no persistence, no reinterpretation.
            return (*status, body.clone()).into_response();
        }

        let (status, tag) = match &self {
            GatewayError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            GatewayError::UpstreamRetrieval(_) => (StatusCode::BAD_GATEWAY, "retrieval_error"),
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            GatewayError::UpstreamLlm { .. } => unreachable!(),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            GATEWAY_STATUS_HEADER,
            HeaderValue::from_static(tag),
        );

        let body = Json(ErrorBody {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
