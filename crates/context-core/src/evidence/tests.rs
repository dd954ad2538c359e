use super::*;

const NOW: i64 = 1_700_000_000;

fn kw(id: &str, text: &str, ts: i64) -> EvidenceRecord {
    adapt_keyword_candidates(
        &[KeywordCandidate {
            keyword: id.to_string(),
            text: text.to_string(),
            ts: Some(ts),
        }],
        NOW,
    )
    .remove(0)
}

fn vec_candidate(id: &str, chunk: Option<&str>, text: &str, score: f64) -> EvidenceRecord {
    adapt_vector_candidates(
        &[VectorCandidate {
            source_id: id.to_string(),
            chunk_id: chunk.map(str::to_string),
            source_name: "doc".to_string(),
            text: text.to_string(),
            score,
            ts: Some(NOW),
        }],
        NOW,
    )
    .remove(0)
}

#[test]
fn recency_score_buckets() {
    assert_eq!(recency_score(Some(NOW), NOW), 1.0);
    assert_eq!(recency_score(Some(NOW - 3 * 86_400), NOW), 0.8);
    assert_eq!(recency_score(Some(NOW - 20 * 86_400), NOW), 0.6);
    assert_eq!(recency_score(Some(NOW - 90 * 86_400), NOW), 0.3);
    assert_eq!(recency_score(None, NOW), 0.0);
}

#[test]
fn scoring_is_deterministic_for_identical_inputs() {
    let a = score_and_rank_candidates(vec![kw("k1", "hello", NOW), vec_candidate("v1", None, "world", 0.9)]);
    let b = score_and_rank_candidates(vec![kw("k1", "hello", NOW), vec_candidate("v1", None, "world", 0.9)]);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn rank_orders_by_score_then_priority_then_recency() {
    let current = build_summary_candidates("what's the weather", None, None, NOW)
        .remove(0);
    let low_vec = vec_candidate("v1", None, "irrelevant", 0.1);
    let ranked = score_and_rank_candidates(vec![low_vec.clone(), current.clone()]);
    assert_eq!(ranked[0].id, current.id);
    assert_eq!(ranked[1].id, low_vec.id);
}

#[test]
fn dedup_completeness_no_shared_key_or_near_duplicate_text_survives() {
    let a = vec_candidate("doc-1", Some("c1"), "rust error handling patterns", 0.8);
    let b = vec_candidate("doc-1", Some("c1"), "rust error handling idioms", 0.5);
    let c = kw("doc-2", "rust error handling patterns and idioms", NOW);
    let ranked = score_and_rank_candidates(vec![a, b, c]);
    let result = postprocess_candidates(ranked, 10);

    let mut seen_keys = std::collections::HashSet::new();
    for record in &result {
        let key = (record.source_id.clone(), record.meta.chunk_id.clone());
        assert!(seen_keys.insert(key), "duplicate (source_id, chunk_id) survived");
    }
    for i in 0..result.len() {
        for j in (i + 1)..result.len() {
            let ti = tokenize(&result[i].text);
            let tj = tokenize(&result[j].text);
            assert!(jaccard(&ti, &tj) <= 0.9, "near-duplicate text survived dedup");
        }
    }
}

#[test]
fn key_based_dedup_keeps_higher_score_and_records_loser() {
    let high = vec_candidate("doc-1", Some("c1"), "alpha", 0.9);
    let low = vec_candidate("doc-1", Some("c1"), "alpha", 0.1);
    let ranked = score_and_rank_candidates(vec![low, high.clone()]);
    let result = postprocess_candidates(ranked, 10);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].source_id, "doc-1");
    assert_eq!(result[0].score_final, high.score_final);
    assert_eq!(result[0].meta.duplicates.as_ref().unwrap().len(), 1);
}

#[test]
fn top_n_truncates_after_final_sort() {
    let records: Vec<EvidenceRecord> = (0..5)
        .map(|i| vec_candidate(&format!("doc-{i}"), None, &format!("unique text number {i}"), i as f64 / 10.0))
        .collect();
    let ranked = score_and_rank_candidates(records);
    let result = postprocess_candidates(ranked, 3);
    assert_eq!(result.len(), 3);
    assert!(result.windows(2).all(|w| w[0].score_final >= w[1].score_final));
}

#[test]
fn grounding_classifier_empty_is_none() {
    assert_eq!(compute_grounding_mode(&[]), GroundingMode::None);
}

#[test]
fn grounding_classifier_weak_boundary() {
    let mut low_with_text = vec_candidate("v1", None, "some text", 0.0);
    low_with_text.score_final = 0.40;
    assert_eq!(compute_grounding_mode(&[low_with_text]), GroundingMode::Weak);
}

#[test]
fn grounding_classifier_strong_with_two_non_empty_texts_despite_low_top_score() {
    let mut a = vec_candidate("v1", None, "alpha text", 0.0);
    a.score_final = 0.40;
    let mut b = vec_candidate("v2", None, "beta text", 0.0);
    b.score_final = 0.30;
    assert_eq!(compute_grounding_mode(&[a, b]), GroundingMode::Strong);
}

#[test]
fn grounding_classifier_high_top_score_is_strong() {
    let mut only = vec_candidate("v1", None, "alpha text", 0.0);
    only.score_final = 0.9;
    assert_eq!(compute_grounding_mode(&[only]), GroundingMode::Strong);
}
