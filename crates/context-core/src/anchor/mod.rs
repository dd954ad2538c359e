//! Anchor RAG client (C3): a single blocking-mode call to the external
//! retrieval workflow, extracting the snippet and vector candidates out
//! of whichever response shape the workflow engine wraps them in.

pub mod error;


use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

pub use error::AnchorError;

/// One raw vector candidate as returned by the RAG workflow, before
/// adaptation into an evidence record.
#[derive(Debug, Clone)]
pub struct RawVectorCandidate {
    pub source_id: String,
    pub chunk_id: Option<String>,
    pub source_name: String,
    pub text: String,
    pub score: f64,
}

/// The parsed shape of a single anchor workflow call.
#[derive(Debug, Clone, Default)]
pub struct AnchorResult {
    pub result: String,
    pub chat_text: String,
    pub vector_candidates: Vec<RawVectorCandidate>,
    /// The full, unmodified response body — kept for pass-through debug fields.
    pub raw: Value,
}

impl AnchorResult {
    /// `result` if non-empty, else `chat_text`.
    pub fn snippet(&self) -> &str {
        if !self.result.trim().is_empty() {
            &self.result
        } else {
            &self.chat_text
        }
    }
}

/// Client for the external RAG workflow endpoint.
pub struct AnchorClient {
    http: Client,
    base_url: String,
    run_url: String,
    api_key: String,
    workflow_id: String,
    timeout: Duration,
}

impl AnchorClient {
    pub fn new(base_url: String, run_url: String, api_key: String, workflow_id: String, timeout_secs: f64) -> Self {
        Self {
            http: Client::new(),
            base_url,
            run_url,
            api_key,
            workflow_id,
            timeout: Duration::from_secs_f64(timeout_secs.max(0.0)),
        }
    }

    fn run_url(&self) -> String {
        if !self.run_url.trim().is_empty() {
            self.run_url.clone()
        } else {
            format!("{}/v1/workflows/run", self.base_url.trim_end_matches('/'))
        }
    }

    /// Call the workflow with `keyword`, on behalf of `user`.
    pub async fn query(&self, keyword: &str, user: &str) -> Result<AnchorResult, AnchorError> {
        if self.api_key.trim().is_empty() {
            return Err(AnchorError::MissingCredentials);
        }

        let mut body = serde_json::json!({
            "inputs": { "keyword": keyword },
            "response_mode": "blocking",
            "user": user,
        });
        if !self.workflow_id.trim().is_empty() {
            body["workflow_id"] = Value::String(self.workflow_id.clone());
        }

        let response = self
            .http
            .post(self.run_url())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnchorError::Transport(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AnchorError::Transport(e.to_string()))?;

        if status.as_u16() >= 400 {
            return Err(AnchorError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(parse_anchor_response(body))
    }
}

/// Extract `result`/`chat_text`/`vector_candidates` from the nested
/// `data.outputs.*` or `outputs.*` shape, whichever is present.
fn parse_anchor_response(body: Value) -> AnchorResult {
    let outputs = body
        .get("data")
        .and_then(|d| d.get("outputs"))
        .or_else(|| body.get("outputs"))
        .cloned()
        .unwrap_or(Value::Null);

    let result = outputs
        .get("result")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let chat_text = outputs
        .get("chat_text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let vector_candidates = outputs
        .get("vector_candidates")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(parse_vector_candidate).collect())
        .unwrap_or_default();

    AnchorResult {
        result,
        chat_text,
        vector_candidates,
        raw: body,
    }
}

/// Missing/empty `text` is allowed — the candidate is kept with
/// `text=""` and left for grounding-mode computation to filter later.
fn parse_vector_candidate(item: &Value) -> RawVectorCandidate {
    let text = item.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string();
    RawVectorCandidate {
        source_id: item
            .get("source_id")
            .or_else(|| item.get("id"))
            .and_then(|v| v.as_str())
            .unwrap_or("vector")
            .to_string(),
        chunk_id: item
            .get("chunk_id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        source_name: item
            .get("source_name")
            .or_else(|| item.get("source"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        text,
        score: item.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0),
    }
}

/// Truncate `text` to at most `max_chars` characters, appending a
/// trailing ellipsis on overflow.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}
