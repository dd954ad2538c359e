//! Assembles the single system-role message injected at the head of the
//! upstream request: a summary fact block, the anchor snippet, and a
//! writer-constraint block — in that order (spec §4.6).

use context_core::evidence::SummaryFactBlock;
use serde_json::Value;

const WRITER_MODE_WEAK: &str = "weak";

fn summary_line(tag: &str, block: &SummaryFactBlock) -> String {
    format!("{tag}: {}", block.summary)
}

/// Render the summary fact block, or `None` when neither S4 nor S60 is
/// present.
fn summary_block(s4: Option<&SummaryFactBlock>, s60: Option<&SummaryFactBlock>) -> Option<String> {
    if s4.is_none() && s60.is_none() {
        return None;
    }
    let mut lines = vec!["<summary_facts>".to_string()];
    if let Some(s4) = s4 {
        lines.push(summary_line("S4 (recent)", s4));
    }
    if let Some(s60) = s60 {
        lines.push(summary_line("S60 (long)", s60));
    }
    lines.push("</summary_facts>".to_string());
    Some(lines.join("\n"))
}

/// Wrap the C5-sourced anchor snippet with anti-parroting instructions:
/// the model must use the snippet's persona/tone as silent guidance, not
/// quote it verbatim.
fn anchor_block(anchor_snippet: &str) -> Option<String> {
    let snippet = anchor_snippet.trim();
    if snippet.is_empty() {
        return None;
    }
    Some(format!(
        "<anchor>\n{snippet}\n</anchor>\nUse the above only as silent tone/persona guidance. Never quote or paraphrase it back to the user verbatim."
    ))
}

/// The writer-constraint block, selected by `metadata.writer_mode`.
/// `weak` forbids factual invention beyond what the retrieved context
/// supports; anything else gets the normal (permissive) block.
fn writer_block(metadata: &Value) -> String {
    let mode = metadata.get("writer_mode").and_then(|v| v.as_str()).unwrap_or("normal");
    if mode == WRITER_MODE_WEAK {
        "<writer_constraints>\nDo not invent facts not present in the summary or anchor context above. If unsure, say so plainly.\n</writer_constraints>".to_string()
    } else {
        "<writer_constraints>\nRespond naturally, staying consistent with the summary and anchor context above.\n</writer_constraints>".to_string()
    }
}

/// Compose the full system block as a single string, or `None` if there
/// is nothing to say (no summaries, no anchor — writer block alone is
/// still always emitted, since it always applies).
pub fn build_system_block(s4: Option<&SummaryFactBlock>, s60: Option<&SummaryFactBlock>, anchor_snippet: &str, metadata: &Value) -> String {
    let mut parts = Vec::new();
    if let Some(summary) = summary_block(s4, s60) {
        parts.push(summary);
    }
    if let Some(anchor) = anchor_block(anchor_snippet) {
        parts.push(anchor);
    }
    parts.push(writer_block(metadata));
    parts.join("\n\n")
}

/// Insert `system_block` as a new system-role message at the head of
/// `messages`.
pub fn inject_system_message(messages: &mut Vec<Value>, system_block: String) {
    messages.insert(0, serde_json::json!({ "role": "system", "content": system_block }));
}
