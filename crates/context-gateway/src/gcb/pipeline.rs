//! The `gateway_ctx` tool's eight-step core pipeline (spec §4.5).

use std::time::{SystemTime, UNIX_EPOCH};

use context_core::anchor::{truncate_snippet, RawVectorCandidate};
use context_core::cache::{CacheLookup, CacheMissReason};
use context_core::evidence::{
    self, build_summary_candidates, compute_grounding_mode, KeywordCandidate, SummaryFactBlock,
    VectorCandidate,
};
use context_core::keyword::{emotional_fallback_keyword, normalize_keyword, resolve_primary_keyword};
use serde_json::{json, Value};

use crate::state::AppState;

/// Arguments to the `gateway_ctx` tool call.
#[derive(Debug, Clone, Default)]
pub struct GatewayCtxArgs {
    pub keyword: String,
    pub text: String,
    pub user: String,
    pub s4: Option<SummaryFactBlock>,
    pub s60: Option<SummaryFactBlock>,
}

impl GatewayCtxArgs {
    pub fn from_value(value: &Value, default_user: &str) -> Self {
        let keyword = value.get("keyword").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let text = value.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let user = value
            .get("user")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(default_user)
            .to_string();

        let summaries = value.get("summaries");
        let parse_block = |key: &str| -> Option<SummaryFactBlock> {
            let block = summaries?.get(key)?;
            Some(SummaryFactBlock {
                summary: block.get("summary").cloned().unwrap_or(Value::Null),
                created_at: block.get("created_at").and_then(|v| v.as_str()).map(str::to_string),
            })
        };

        Self {
            keyword,
            text,
            user,
            s4: parse_block("s4"),
            s60: parse_block("s60"),
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The outcome of [`run_pipeline`]: either a composed result object
/// (written to cache on the miss path) or an error to surface as
/// `isError: true` without touching the cache.
pub enum PipelineOutcome {
    Ok(Value),
    Err(String),
}

/// Run the two-phase retrieval pipeline and return the composed result
/// object (or an error). Never panics on malformed RAG responses —
/// missing fields default to empty/zero.
pub async fn run_pipeline(state: &AppState, args: GatewayCtxArgs) -> PipelineOutcome {
    let now = now_unix();
    let config = &state.config;

    let primary_keyword_raw = resolve_primary_keyword(&args.keyword, &args.text, config.garbled_kw_repair_enabled);
    let primary_keyword = normalize_keyword(&primary_keyword_raw);

    let cache_key_probe = state
        .cache
        .get(&args.user, &primary_keyword, &config.retrieval_profile_version, now);

    if let CacheLookup::Hit(hit) = cache_key_probe {
        let mut result = hit.result.clone();
        if let Value::Object(ref mut map) = result {
            map.insert("cache_hit".to_string(), json!(true));
            map.insert("cache_miss_reason".to_string(), json!("bypassed"));
            map.insert(
                "retrieval_profile_version".to_string(),
                json!(config.retrieval_profile_version),
            );
        }
        return PipelineOutcome::Ok(result);
    }
    let miss_reason = match cache_key_probe {
        CacheLookup::Miss(reason) => reason,
        CacheLookup::Hit(_) => unreachable!(),
    };

    let primary_call_start = std::time::Instant::now();
    let primary_anchor = state.anchor.query(&primary_keyword, &args.user).await;
    let ms_dify_primary = primary_call_start.elapsed().as_millis() as i64;

    let (primary_anchor, primary_err) = match primary_anchor {
        Ok(a) => (Some(a), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let primary_snippet = primary_anchor
        .as_ref()
        .map(|a| truncate_snippet(a.snippet(), config.anchor_snip_max))
        .unwrap_or_default();

    let mut keyword_used = primary_keyword.clone();
    let mut ctx = primary_snippet.clone();
    let mut used_anchor = primary_anchor.clone();
    let mut ms_dify_used = ms_dify_primary;
    let mut fallback_err: Option<String> = None;

    if ctx.trim().is_empty() {
        let fallback_keyword_raw = emotional_fallback_keyword(&args.text);
        let fallback_keyword = normalize_keyword(&fallback_keyword_raw);
        if fallback_keyword != primary_keyword {
            let fallback_call_start = std::time::Instant::now();
            let fallback_anchor = state.anchor.query(&fallback_keyword, &args.user).await;
            let ms_dify_fallback = fallback_call_start.elapsed().as_millis() as i64;
            match fallback_anchor {
                Ok(a) => {
                    let snippet = truncate_snippet(a.snippet(), config.anchor_snip_max);
                    if !snippet.trim().is_empty() {
                        keyword_used = fallback_keyword;
                        ctx = snippet;
                        ms_dify_used = ms_dify_fallback;
                        used_anchor = Some(a);
                    }
                }
                Err(e) => fallback_err = Some(e.to_string()),
            }
        }
    }

    if primary_anchor.is_none() && used_anchor.is_none() {
        let message = primary_err
            .or(fallback_err)
            .unwrap_or_else(|| "anchor retrieval failed".to_string());
        return PipelineOutcome::Err(message);
    }

    let mut keyword_candidates = vec![KeywordCandidate {
        keyword: primary_keyword.clone(),
        text: primary_snippet.clone(),
        ts: Some(now),
    }];
    if keyword_used != primary_keyword {
        keyword_candidates.push(KeywordCandidate {
            keyword: keyword_used.clone(),
            text: ctx.clone(),
            ts: Some(now),
        });
    }

    let vector_candidates: Vec<VectorCandidate> = used_anchor
        .as_ref()
        .map(|a| raw_to_vector_candidates(&a.vector_candidates, now))
        .unwrap_or_default();

    let mut records = Vec::new();
    records.extend(evidence::adapt_keyword_candidates(&keyword_candidates, now));
    records.extend(evidence::adapt_vector_candidates(&vector_candidates, now));
    records.extend(build_summary_candidates(&args.text, args.s4.as_ref(), args.s60.as_ref(), now));

    let ranked = evidence::score_and_rank_candidates(records);
    let final_evidence = evidence::postprocess_candidates(ranked, config.retrieval_top_n);
    let grounding_mode = compute_grounding_mode(&final_evidence);
    let used_evidence_ids: Vec<String> = final_evidence.iter().map(|r| r.id.clone()).collect();

    let raw = used_anchor.as_ref().map(|a| a.raw.clone()).unwrap_or(Value::Null);

    let cache_miss_reason_str = match miss_reason {
        CacheMissReason::Bypassed => "bypassed",
        CacheMissReason::Expired => "expired",
        CacheMissReason::ProfileChanged => "profile_changed",
        CacheMissReason::NotFound => "not_found",
    };

    let result = json!({
        "keyword": keyword_used,
        "keyword_primary": primary_keyword,
        "keyword_used": keyword_used,
        "ctx": ctx,
        "raw": raw,
        "evidence": final_evidence,
        "used_evidence_ids": used_evidence_ids,
        "retrieval_profile_version": config.retrieval_profile_version,
        "ms_dify_primary": ms_dify_primary,
        "ms_dify_used": ms_dify_used,
        "cache_hit": false,
        "cache_miss_reason": cache_miss_reason_str,
        "grounding_mode": grounding_mode.as_str(),
    });

    state.cache.put(
        &args.user,
        &primary_keyword,
        &config.retrieval_profile_version,
        now,
        ctx,
        result.clone(),
    );

    PipelineOutcome::Ok(result)
}

fn raw_to_vector_candidates(raw: &[RawVectorCandidate], now: i64) -> Vec<VectorCandidate> {
    raw.iter()
        .map(|c| VectorCandidate {
            source_id: c.source_id.clone(),
            chunk_id: c.chunk_id.clone(),
            source_name: c.source_name.clone(),
            text: c.text.clone(),
            score: c.score,
            ts: Some(now),
        })
        .collect()
}

/// Wrap a composed result object as an MCP tool-call result.
pub fn wrap_tool_result(outcome: &PipelineOutcome) -> Value {
    match outcome {
        PipelineOutcome::Ok(result) => {
            let ctx = result.get("ctx").and_then(|v| v.as_str()).unwrap_or("").to_string();
            json!({
                "content": [{ "type": "text", "text": ctx }],
                "isError": false,
                "data": result,
            })
        }
        PipelineOutcome::Err(message) => {
            json!({
                "content": [{ "type": "text", "text": message }],
                "isError": true,
            })
        }
    }
}

