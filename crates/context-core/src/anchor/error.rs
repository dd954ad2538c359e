use serde_json::Value;
use thiserror::Error;

/// Errors from the anchor RAG client.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// `DIFY_API_KEY`/`DIFY_WORKFLOW_API_KEY` were not configured.
    #[error("anchor workflow credentials are not configured")]
    MissingCredentials,

    /// The workflow engine returned an HTTP status >= 400.
    #[error("anchor workflow returned status {status}")]
    UpstreamStatus { status: u16, body: Value },

    /// Network or body-decode failure talking to the workflow engine.
    #[error("anchor workflow request failed: {0}")]
    Transport(String),
}
