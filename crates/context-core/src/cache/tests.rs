use super::*;
use serde_json::json;

#[test]
fn fresh_entry_hits_with_matching_snippet() {
    let cache = ContextCache::new(20.0, 256);
    cache.put("u1", "kw", "v1", 100, "snippet".to_string(), json!({"ok": true}));
    match cache.get("u1", "kw", "v1", 105) {
        CacheLookup::Hit(hit) => {
            assert_eq!(hit.snippet, "snippet");
            assert_eq!(hit.stored_at, 100);
        }
        CacheLookup::Miss(reason) => panic!("expected hit, got miss: {reason:?}"),
    }
}

#[test]
fn ttl_expiry_reports_expired_reason() {
    let cache = ContextCache::new(20.0, 256);
    cache.put("u1", "kw", "v1", 100, "snippet".to_string(), json!({}));
    // t + TTL + epsilon
    match cache.get("u1", "kw", "v1", 121) {
        CacheLookup::Miss(CacheMissReason::Expired) => {}
        other => panic!("expected Expired miss, got {other:?}"),
    }
}

#[test]
fn unknown_key_reports_not_found() {
    let cache = ContextCache::new(20.0, 256);
    match cache.get("u1", "kw", "v1", 0) {
        CacheLookup::Miss(CacheMissReason::NotFound) => {}
        other => panic!("expected NotFound miss, got {other:?}"),
    }
}

#[test]
fn profile_version_bump_reports_profile_changed() {
    let cache = ContextCache::new(20.0, 256);
    cache.put("u1", "kw", "v1", 100, "snippet".to_string(), json!({}));
    match cache.get("u1", "kw", "v2", 101) {
        CacheLookup::Miss(CacheMissReason::ProfileChanged) => {}
        other => panic!("expected ProfileChanged miss, got {other:?}"),
    }
}

#[test]
fn legacy_key_shape_counts_as_profile_changed() {
    let cache = ContextCache::new(20.0, 256);
    {
        let mut guard = cache.inner.lock();
        guard.entries.insert(
            ContextCache::legacy_key("u1", "kw"),
            Entry {
                stored_at: 100,
                snippet: "legacy".to_string(),
                result: json!({}),
            },
        );
    }
    match cache.get("u1", "kw", "v1", 101) {
        CacheLookup::Miss(CacheMissReason::ProfileChanged) => {}
        other => panic!("expected ProfileChanged miss, got {other:?}"),
    }
}

#[test]
fn cap_eviction_keeps_max_and_drops_oldest() {
    let cache = ContextCache::new(1_000.0, 4);
    for i in 0..5 {
        cache.put("u1", &format!("kw{i}"), "v1", 100 + i, format!("s{i}"), json!({}));
    }
    assert_eq!(cache.len(), 4);
    match cache.get("u1", "kw0", "v1", 200) {
        CacheLookup::Miss(CacheMissReason::NotFound) => {}
        other => panic!("expected the oldest entry to be evicted, got {other:?}"),
    }
    match cache.get("u1", "kw4", "v1", 200) {
        CacheLookup::Hit(_) => {}
        other => panic!("expected the newest entry to survive, got {other:?}"),
    }
}
