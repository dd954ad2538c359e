//! Shared test harness: an in-process axum `Router` driven with
//! `tower::ServiceExt::oneshot`, plus tiny mock HTTP servers standing in
//! for the Dify anchor workflow and the upstream chat-completions
//! provider so the proxy/GCB code paths run unmodified end to end.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use axum::{body::Body, Json, Router};
use context_core::config::AppConfig;
use context_core::summary::{InMemorySummaryStore, TurnSink, TurnSinkError};
use context_gateway::AppState;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// A [`TurnSink`] that remembers every call, for post-hoc assertions.
#[derive(Default)]
pub struct RecordingTurnSink {
    pub turns: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl TurnSink for RecordingTurnSink {
    async fn record_turn(&self, session_id: &str, user_text: &str, assistant_text: &str) -> Result<(), TurnSinkError> {
        self.turns
            .lock()
            .unwrap()
            .push((session_id.to_string(), user_text.to_string(), assistant_text.to_string()));
        Ok(())
    }
}

/// Build an [`AppState`] wired to a [`RecordingTurnSink`] the caller can
/// inspect, over the given `config`.
pub fn test_state(config: AppConfig) -> (AppState, Arc<RecordingTurnSink>) {
    let turns = Arc::new(RecordingTurnSink::default());
    let state = AppState::new(Arc::new(config), Arc::new(InMemorySummaryStore::new()), turns.clone());
    (state, turns)
}

/// Poll `f` until it returns `Some`, or panic after ~1s. Used where a
/// background persistence task races the test against stream closure.
pub async fn wait_until<T>(mut f: impl FnMut() -> Option<T>) -> T {
    for _ in 0..200 {
        if let Some(v) = f() {
            return v;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition never became true within the test timeout");
}

struct DifyMockState {
    answers: HashMap<String, (String, String)>,
    calls: Arc<AtomicUsize>,
}

async fn dify_run_handler(State(state): State<Arc<DifyMockState>>, Json(body): Json<Value>) -> Json<Value> {
    state.calls.fetch_add(1, Ordering::SeqCst);
    let keyword = body
        .get("inputs")
        .and_then(|v| v.get("keyword"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let (result, chat_text) = state.answers.get(keyword).cloned().unwrap_or_default();
    Json(json!({
        "data": { "outputs": { "result": result, "chat_text": chat_text, "vector_candidates": [] } }
    }))
}

/// Spawn a mock Dify workflow-run endpoint that answers a fixed set of
/// `keyword -> (result, chat_text)` pairs; any other keyword gets an
/// empty (miss) response. Returns the full run URL and a shared call
/// counter.
pub async fn spawn_dify_mock(answers: HashMap<String, (String, String)>) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let state = Arc::new(DifyMockState { answers, calls: calls.clone() });
    let app = Router::new().route("/v1/workflows/run", post(dify_run_handler)).with_state(state);
    let addr = spawn_server(app).await;
    (format!("http://{addr}/v1/workflows/run"), calls)
}

/// Spawn a mock upstream chat-completions endpoint that always replies
/// with the given raw SSE body (streaming).
pub async fn spawn_upstream_mock_stream(sse_body: &'static str) -> String {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || async move {
            Response::builder()
                .status(200)
                .header("content-type", "text/event-stream")
                .body(Body::from(sse_body))
                .unwrap()
        }),
    );
    let addr = spawn_server(app).await;
    format!("http://{addr}")
}

/// Spawn a mock upstream chat-completions endpoint that always replies
/// with the given JSON body (non-streaming).
pub async fn spawn_upstream_mock_buffered(body: Value) -> String {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let body = body.clone();
            async move { Json(body) }
        }),
    );
    let addr = spawn_server(app).await;
    format!("http://{addr}")
}

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}
