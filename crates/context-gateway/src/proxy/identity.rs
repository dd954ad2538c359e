//! Identity resolution for a chat-completions request: thread/memory/
//! agent ids and the S4 scope, each derived with header → metadata →
//! env-default precedence.

use axum::http::HeaderMap;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub thread_id: String,
    pub memory_id: String,
    pub agent_id: String,
    pub s4_scope: String,
    /// `thread_id` doubles as the persistence session id.
    pub session_id: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|s| !s.is_empty())
}

fn metadata_str<'a>(metadata: &'a Value, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// `rk:th:{YYYYMMDDhhmm}:{12-hex}` — used when no thread id was supplied
/// anywhere in the request.
fn generate_thread_id(now_unix: i64) -> String {
    let stamp = chrono::DateTime::from_timestamp(now_unix, 0).unwrap_or_default();
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(12).collect();
    format!("rk:th:{}:{suffix}", stamp.format("%Y%m%d%H%M"))
}

/// Normalize an `s4_scope` value to `{thread, memory}`, mapping `auto`
/// to `thread`.
fn normalize_s4_scope(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "memory" => "memory".to_string(),
        _ => "thread".to_string(),
    }
}

pub fn resolve_identity(headers: &HeaderMap, metadata: &Value, now_unix: i64, memory_id_default: &str, agent_id_default: &str) -> Identity {
    let thread_id = header_str(headers, "x-thread-id")
        .or_else(|| metadata_str(metadata, "thread_id"))
        .or_else(|| header_str(headers, "x-session-id"))
        .map(str::to_string)
        .unwrap_or_else(|| generate_thread_id(now_unix));

    let memory_id = header_str(headers, "x-memory-id")
        .or_else(|| metadata_str(metadata, "memory_id"))
        .map(str::to_string)
        .unwrap_or_else(|| memory_id_default.to_string());

    let agent_id = header_str(headers, "x-agent-id")
        .or_else(|| metadata_str(metadata, "agent_id"))
        .map(str::to_string)
        .unwrap_or_else(|| agent_id_default.to_string());

    let s4_scope_raw = metadata_str(metadata, "s4_scope").unwrap_or("thread");
    let s4_scope = normalize_s4_scope(s4_scope_raw);

    Identity {
        session_id: thread_id.clone(),
        thread_id,
        memory_id,
        agent_id,
        s4_scope,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[test]
    fn thread_id_precedence_prefers_header_over_metadata() {
        let headers = headers_with(&[("x-thread-id", "th-from-header")]);
        let metadata = json!({"thread_id": "th-from-metadata"});
        let identity = resolve_identity(&headers, &metadata, 0, "", "");
        assert_eq!(identity.thread_id, "th-from-header");
        assert_eq!(identity.session_id, "th-from-header");
    }

    #[test]
    fn thread_id_falls_back_to_session_header() {
        let headers = headers_with(&[("x-session-id", "sess-123")]);
        let identity = resolve_identity(&headers, &json!({}), 0, "", "");
        assert_eq!(identity.thread_id, "sess-123");
    }

    #[test]
    fn thread_id_generated_when_nothing_supplied() {
        let identity = resolve_identity(&HeaderMap::new(), &json!({}), 1_700_000_000, "", "");
        assert!(identity.thread_id.starts_with("rk:th:"));
    }

    #[test]
    fn s4_scope_auto_normalizes_to_thread() {
        let identity = resolve_identity(&HeaderMap::new(), &json!({"s4_scope": "auto"}), 0, "", "");
        assert_eq!(identity.s4_scope, "thread");
    }

    #[test]
    fn s4_scope_memory_is_preserved() {
        let identity = resolve_identity(&HeaderMap::new(), &json!({"s4_scope": "memory"}), 0, "", "");
        assert_eq!(identity.s4_scope, "memory");
    }
}
