//! Tool-call thread sanitization: upstreams reject an assistant/tool
//! message thread where a `tool` message's `tool_call_id` doesn't match
//! a preceding assistant `tool_calls` entry, or where `tool_calls` are
//! left dangling with no reply. Only runs when the request itself
//! carries no `tools`/`functions` — a request built for tool use passes
//! through untouched.

use std::collections::HashSet;

use serde_json::Value;

/// Sanitize a chat message list in place, per spec §4.6. No-op if
/// `tools` or `functions` is present in the request body.
pub fn sanitize_messages(messages: &[Value], request: &Value) -> Vec<Value> {
    if request.get("tools").is_some() || request.get("functions").is_some() {
        return messages.to_vec();
    }

    let mut cleaned: Vec<Value> = Vec::with_capacity(messages.len());
    let mut pending: HashSet<String> = HashSet::new();

    for message in messages {
        let role = message.get("role").and_then(|v| v.as_str()).unwrap_or("");

        if role == "tool" {
            let call_id = message.get("tool_call_id").and_then(|v| v.as_str()).unwrap_or("");
            if pending.remove(call_id) {
                cleaned.push(message.clone());
            }
            continue;
        }

        if role == "assistant" {
            let has_function_call = message.get("function_call").is_some();
            let content_empty = message
                .get("content")
                .map(|c| c.as_str().map(str::is_empty).unwrap_or(false))
                .unwrap_or(false);
            if has_function_call && content_empty {
                continue;
            }
        }

        if !pending.is_empty() {
            strip_dangling_tool_calls(&mut cleaned);
            pending.clear();
        }

        if role == "assistant" {
            if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
                pending = calls
                    .iter()
                    .filter_map(|c| c.get("id").and_then(|v| v.as_str()).map(str::to_string))
                    .collect();
            }
        }

        cleaned.push(message.clone());
    }

    cleaned
}

fn strip_dangling_tool_calls(cleaned: &mut [Value]) {
    for message in cleaned.iter_mut().rev() {
        let is_assistant = message.get("role").and_then(|v| v.as_str()) == Some("assistant");
        if !is_assistant {
            continue;
        }
        if let Value::Object(map) = message {
            map.remove("tool_calls");
            map.remove("function_call");
        }
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passes_through_when_tools_present() {
        let messages = vec![json!({"role": "tool", "tool_call_id": "orphan", "content": "x"})];
        let request = json!({"tools": [{}]});
        let result = sanitize_messages(&messages, &request);
        assert_eq!(result, messages);
    }

    #[test]
    fn drops_tool_message_with_unmatched_call_id() {
        let messages = vec![
            json!({"role": "user", "content": "hi"}),
            json!({"role": "tool", "tool_call_id": "orphan", "content": "x"}),
        ];
        let result = sanitize_messages(&messages, &json!({}));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn keeps_matched_tool_reply() {
        let messages = vec![
            json!({"role": "assistant", "content": null, "tool_calls": [{"id": "call_1"}]}),
            json!({"role": "tool", "tool_call_id": "call_1", "content": "result"}),
        ];
        let result = sanitize_messages(&messages, &json!({}));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn strips_dangling_tool_calls_when_followed_by_non_tool_message() {
        let messages = vec![
            json!({"role": "assistant", "content": null, "tool_calls": [{"id": "call_1"}]}),
            json!({"role": "user", "content": "never mind"}),
        ];
        let result = sanitize_messages(&messages, &json!({}));
        assert_eq!(result.len(), 2);
        assert!(result[0].get("tool_calls").is_none());
    }

    #[test]
    fn drops_legacy_empty_function_call_message() {
        let messages = vec![json!({"role": "assistant", "content": "", "function_call": {"name": "f"}})];
        let result = sanitize_messages(&messages, &json!({}));
        assert!(result.is_empty());
    }
}
