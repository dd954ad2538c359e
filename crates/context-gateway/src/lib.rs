//! OpenAI-compatible chat-completions gateway: the Gateway Context
//! Builder (JSON-RPC tool endpoint) and the Proxy Orchestrator
//! (`/v1/chat/completions`), wired together over a shared [`AppState`].

pub mod crud;
pub mod error;
pub mod gcb;
pub mod proxy;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the full axum router: GCB's JSON-RPC endpoint, the proxy's
/// chat-completions endpoint, thin out-of-core CRUD routes, and
/// liveness probes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(proxy::chat_completions))
        .route(
            "/gateway_ctx",
            get(gcb::discovery_handler)
                .options(gcb::discovery_handler)
                .post(gcb::rpc_handler),
        )
        .route("/chat", post(crud::append_turn))
        .route("/sessions/{id}/summaries", get(crud::get_summaries))
        .route("/sessions/{id}/summaries/debug", get(crud::get_summaries_debug))
        .route("/sessions/{id}/proactive/enable", post(crud::enable_proactive))
        .route("/healthz", get(healthz))
        .route("/ready", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
