//! Evidence scoring: adapt heterogeneous retrieval candidates into a
//! unified, ranked, deduplicated evidence list.

pub mod types;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

pub use types::{DuplicateRef, EvidenceMeta, EvidenceRecord, GroundingMode, ScoreRaw, SourceType};
use types::round6;

/// A keyword-retrieval hit feeding [`adapt_keyword_candidates`].
#[derive(Debug, Clone)]
pub struct KeywordCandidate {
    pub keyword: String,
    pub text: String,
    pub ts: Option<i64>,
}

/// A vector-similarity hit feeding [`adapt_vector_candidates`].
#[derive(Debug, Clone)]
pub struct VectorCandidate {
    pub source_id: String,
    pub chunk_id: Option<String>,
    pub source_name: String,
    pub text: String,
    /// Similarity in `[0, 1]`; used directly as `score_raw.vector`.
    pub score: f64,
    pub ts: Option<i64>,
}

/// One parsed S4/S60 fact block, as consumed from the summarization store.
#[derive(Debug, Clone)]
pub struct SummaryFactBlock {
    pub summary: serde_json::Value,
    /// ISO-8601 creation timestamp; falls back to `now` when absent/unparseable.
    pub created_at: Option<String>,
}

/// Age-bucketed recency score: `<=1d -> 1.0, <=7d -> 0.8, <=30d -> 0.6,
/// else 0.3`; a missing timestamp scores `0.0`.
pub fn recency_score(ts: Option<i64>, now: i64) -> f64 {
    let Some(ts) = ts else { return 0.0 };
    let age_days = (now - ts).max(0) as f64 / 86_400.0;
    if age_days <= 1.0 {
        1.0
    } else if age_days <= 7.0 {
        0.8
    } else if age_days <= 30.0 {
        0.6
    } else {
        0.3
    }
}

fn parse_iso_seconds(iso: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|dt| dt.timestamp())
}

/// Build evidence records for the keyword retrieval phase (primary and,
/// optionally, the fallback keyword attempt).
pub fn adapt_keyword_candidates(candidates: &[KeywordCandidate], now: i64) -> Vec<EvidenceRecord> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let score_raw = ScoreRaw {
                keyword: 1.0,
                vector: 0.0,
                recency: recency_score(c.ts.or(Some(now)), now),
                type_boost: SourceType::Keyword.type_boost(),
            };
            EvidenceRecord {
                id: format!("kw_{i}"),
                source_type: SourceType::Keyword,
                source_id: c.keyword.clone(),
                text: c.text.clone(),
                score_final: round6(score_raw.weighted_final()),
                score_raw,
                reason: "keyword_hit".to_string(),
                ts: c.ts.unwrap_or(now),
                meta: EvidenceMeta {
                    source_name: c.keyword.clone(),
                    chunk_id: None,
                    source_priority: SourceType::Keyword.source_priority(),
                    duplicates: None,
                },
            }
        })
        .collect()
}

/// Build evidence records for RAG-returned vector candidates.
pub fn adapt_vector_candidates(candidates: &[VectorCandidate], now: i64) -> Vec<EvidenceRecord> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let score_raw = ScoreRaw {
                keyword: 0.0,
                vector: c.score.clamp(0.0, 1.0),
                recency: recency_score(c.ts.or(Some(now)), now),
                type_boost: SourceType::Vector.type_boost(),
            };
            EvidenceRecord {
                id: format!("vec_{i}"),
                source_type: SourceType::Vector,
                source_id: c.source_id.clone(),
                text: c.text.clone(),
                score_final: round6(score_raw.weighted_final()),
                score_raw,
                reason: "vector_hit".to_string(),
                ts: c.ts.unwrap_or(now),
                meta: EvidenceMeta {
                    source_name: c.source_name.clone(),
                    chunk_id: c.chunk_id.clone(),
                    source_priority: SourceType::Vector.source_priority(),
                    duplicates: None,
                },
            }
        })
        .collect()
}

/// Build the synthetic current-input record plus, when present, one
/// record each for the S4/S60 summary fact blocks.
pub fn build_summary_candidates(
    current_input_text: &str,
    s4: Option<&SummaryFactBlock>,
    s60: Option<&SummaryFactBlock>,
    now: i64,
) -> Vec<EvidenceRecord> {
    let mut records = Vec::with_capacity(3);

    if !current_input_text.trim().is_empty() {
        let score_raw = ScoreRaw {
            keyword: 1.0,
            vector: 1.0,
            recency: 1.0,
            type_boost: SourceType::CurrentInput.type_boost(),
        };
        records.push(EvidenceRecord {
            id: "ev_current_input".to_string(),
            source_type: SourceType::CurrentInput,
            source_id: "current_input".to_string(),
            text: current_input_text.to_string(),
            score_final: round6(score_raw.weighted_final()),
            score_raw,
            reason: "current_input".to_string(),
            ts: now,
            meta: EvidenceMeta {
                source_name: "current_input".to_string(),
                chunk_id: None,
                source_priority: SourceType::CurrentInput.source_priority(),
                duplicates: None,
            },
        });
    }

    for (source_type, block, label) in [(SourceType::S4, s4, "s4"), (SourceType::S60, s60, "s60")] {
        let Some(block) = block else { continue };
        let ts = block
            .created_at
            .as_deref()
            .and_then(parse_iso_seconds)
            .unwrap_or(now);
        let text = summary_to_text(&block.summary);
        let score_raw = ScoreRaw {
            keyword: 0.5,
            vector: 0.0,
            recency: recency_score(Some(ts), now),
            type_boost: source_type.type_boost(),
        };
        records.push(EvidenceRecord {
            id: format!("ev_{label}"),
            source_type,
            source_id: label.to_string(),
            text,
            score_final: round6(score_raw.weighted_final()),
            score_raw,
            reason: format!("{label}_summary"),
            ts,
            meta: EvidenceMeta {
                source_name: label.to_string(),
                chunk_id: None,
                source_priority: source_type.source_priority(),
                duplicates: None,
            },
        });
    }

    records
}

/// Render a summary JSON object's fields into a compact single-line
/// snippet for evidence display.
fn summary_to_text(summary: &serde_json::Value) -> String {
    let mut parts = Vec::new();
    if let Some(goal) = summary.get("goal").and_then(|v| v.as_str()) {
        if !goal.is_empty() {
            parts.push(goal.to_string());
        }
    }
    if let Some(state) = summary.get("state").and_then(|v| v.as_str()) {
        if !state.is_empty() {
            parts.push(state.to_string());
        }
    }
    if let Some(loops) = summary.get("open_loops").and_then(|v| v.as_array()) {
        for item in loops.iter().filter_map(|v| v.as_str()) {
            parts.push(item.to_string());
        }
    }
    parts.join("; ")
}

/// Recompute `score_final` for every record and stably sort by
/// `(score_final, source_priority, recency)`, all descending.
pub fn score_and_rank_candidates(mut records: Vec<EvidenceRecord>) -> Vec<EvidenceRecord> {
    for record in &mut records {
        record.score_final = round6(record.score_raw.weighted_final());
    }
    records.sort_by(|a, b| {
        b.score_final
            .partial_cmp(&a.score_final)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.meta.source_priority.cmp(&a.meta.source_priority))
            .then(
                b.score_raw
                    .recency
                    .partial_cmp(&a.score_raw.recency)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    records
}

type DedupKey = (String, Option<String>);

/// Stage 1: merge records sharing `(source_id, chunk_id)`, keeping the
/// higher-scoring one and folding the loser into `meta.duplicates`.
fn dedup_by_key(records: Vec<EvidenceRecord>) -> Vec<EvidenceRecord> {
    let mut keepers: Vec<EvidenceRecord> = Vec::new();
    let mut index_of: HashMap<DedupKey, usize> = HashMap::new();

    for record in records {
        let key: DedupKey = (record.source_id.clone(), record.meta.chunk_id.clone());
        match index_of.get(&key) {
            Some(&idx) => {
                if record.score_final > keepers[idx].score_final {
                    let old = std::mem::replace(&mut keepers[idx], record);
                    keepers[idx].absorb(&old);
                } else {
                    let loser = record;
                    keepers[idx].absorb(&loser);
                }
            }
            None => {
                index_of.insert(key, keepers.len());
                keepers.push(record);
            }
        }
    }
    keepers
}

/// Normalize: lower-case, map any non-word character to a separator,
/// then tokenize as ASCII `[a-z0-9_]+` runs or single CJK codepoints.
fn tokenize(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    let mut ascii_run = String::new();
    for ch in text.to_lowercase().chars() {
        let is_word = ch.is_alphanumeric() || ch == '_';
        if !is_word {
            if !ascii_run.is_empty() {
                tokens.insert(std::mem::take(&mut ascii_run));
            }
            continue;
        }
        if ch.is_ascii() {
            ascii_run.push(ch);
        } else {
            if !ascii_run.is_empty() {
                tokens.insert(std::mem::take(&mut ascii_run));
            }
            tokens.insert(ch.to_string());
        }
    }
    if !ascii_run.is_empty() {
        tokens.insert(ascii_run);
    }
    tokens
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Stage 2: merge any record whose text is a near-duplicate (Jaccard >
/// 0.9) of an already-kept record's text.
fn dedup_by_near_text(records: Vec<EvidenceRecord>) -> Vec<EvidenceRecord> {
    let mut keepers: Vec<EvidenceRecord> = Vec::new();
    let mut keeper_tokens: Vec<HashSet<String>> = Vec::new();

    'records: for record in records {
        let tokens = tokenize(&record.text);
        for i in 0..keepers.len() {
            if jaccard(&tokens, &keeper_tokens[i]) > 0.9 {
                if record.score_final > keepers[i].score_final {
                    let old = std::mem::replace(&mut keepers[i], record);
                    keepers[i].absorb(&old);
                } else {
                    keepers[i].absorb(&record);
                }
                keeper_tokens[i] = tokenize(&keepers[i].text);
                continue 'records;
            }
        }
        keeper_tokens.push(tokens);
        keepers.push(record);
    }
    keepers
}

/// Two-stage dedup followed by a final score sort and `top_n` truncation.
pub fn postprocess_candidates(records: Vec<EvidenceRecord>, top_n: usize) -> Vec<EvidenceRecord> {
    let mut records = dedup_by_key(records);
    records = dedup_by_near_text(records);
    records.sort_by(|a, b| {
        b.score_final
            .partial_cmp(&a.score_final)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    records.truncate(top_n);
    records
}

/// Classify retrieval confidence from the final evidence set. Assumes
/// `records` is sorted descending by `score_final` (true for the output
/// of [`postprocess_candidates`]).
pub fn compute_grounding_mode(records: &[EvidenceRecord]) -> GroundingMode {
    let Some(top) = records.first() else {
        return GroundingMode::None;
    };
    let non_empty_text_count = records.iter().filter(|r| !r.text.trim().is_empty()).count();
    if top.score_final < 0.45 && non_empty_text_count < 2 {
        GroundingMode::Weak
    } else {
        GroundingMode::Strong
    }
}
