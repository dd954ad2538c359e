//! Thin CRUD routes around the summary store — out of core scope, kept
//! minimal since the real persistence/backfill logic lives in the
//! external message store.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// `POST /chat` — append a fully formed turn.
pub async fn append_turn(State(state): State<AppState>, Json(body): Json<Value>) -> impl IntoResponse {
    let session_id = body.get("session_id").and_then(|v| v.as_str()).unwrap_or_default();
    let user_text = body.get("user_text").and_then(|v| v.as_str()).unwrap_or_default();
    let assistant_text = body.get("assistant_text").and_then(|v| v.as_str()).unwrap_or_default();
    match state.turns.record_turn(session_id, user_text, assistant_text).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "ok": true }))),
        Err(e) => {
            tracing::warn!(error = %e, session_id, "failed to persist turn");
            (StatusCode::BAD_GATEWAY, Json(json!({ "ok": false, "error": e.to_string() })))
        }
    }
}

/// `GET /sessions/{id}/summaries` — latest S4/S60 rows for a session.
pub async fn get_summaries(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    let (s4, s60) = state.summaries.latest_summaries(&session_id).await;
    Json(json!({ "s4": s4, "s60": s60 }))
}

/// `GET /sessions/{id}/summaries/debug` — the last N summarization
/// debug events, for operator inspection.
pub async fn get_summaries_debug(State(state): State<AppState>, Path(_session_id): Path<String>) -> impl IntoResponse {
    Json(json!({ "events": state.debug_ring.snapshot_last(50) }))
}

/// `POST /sessions/{id}/proactive/enable` — out of core; acknowledged
/// only, since proactive triggering is owned by the external scheduler.
pub async fn enable_proactive(Path(_session_id): Path<String>) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(json!({ "ok": true })))
}
