//! Process-local context cache (C4): a single mutex-guarded map from
//! `"{user}||{normalized_keyword}||{profile_version}"` to the last
//! retrieval result, with TTL expiry and oldest-first eviction.
//!
//! Deliberately hand-rolled rather than built on a general LRU crate:
//! the cap-eviction and TTL behavior below must be exact (see the
//! testable properties this cache is held to), not merely "a cache".

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

/// Why a lookup missed or, trivially, why it hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMissReason {
    /// A fresh entry was found.
    Bypassed,
    /// An entry existed but its TTL had elapsed.
    Expired,
    /// No entry under this key, but one exists under a different
    /// `profile_version` (or the legacy key shape).
    ProfileChanged,
    /// No entry under this key or any known legacy shape.
    NotFound,
}

/// A successful cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub stored_at: i64,
    pub snippet: String,
    pub result: Value,
}

/// Outcome of [`ContextCache::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CacheHit),
    Miss(CacheMissReason),
}

#[derive(Debug, Clone)]
struct Entry {
    stored_at: i64,
    snippet: String,
    result: Value,
}

struct Inner {
    entries: HashMap<String, Entry>,
}

/// Process-local, mutex-guarded context cache.
pub struct ContextCache {
    inner: Mutex<Inner>,
    ttl_secs: f64,
    max_entries: usize,
}

impl ContextCache {
    pub fn new(ttl_secs: f64, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
            }),
            ttl_secs,
            max_entries,
        }
    }

    /// Build the current-profile cache key.
    pub fn key(user: &str, normalized_keyword: &str, profile_version: &str) -> String {
        format!("{user}||{normalized_keyword}||{profile_version}")
    }

    /// The legacy (pre-profile-version) key shape, kept so a
    /// profile-version bump doesn't look like total cache loss.
    fn legacy_key(user: &str, normalized_keyword: &str) -> String {
        format!("{user}||{normalized_keyword}")
    }

    pub fn get(&self, user: &str, normalized_keyword: &str, profile_version: &str, now: i64) -> CacheLookup {
        let key = Self::key(user, normalized_keyword, profile_version);
        let guard = self.inner.lock();
        if let Some(entry) = guard.entries.get(&key) {
            return if (now - entry.stored_at) as f64 > self.ttl_secs {
                CacheLookup::Miss(CacheMissReason::Expired)
            } else {
                CacheLookup::Hit(CacheHit {
                    stored_at: entry.stored_at,
                    snippet: entry.snippet.clone(),
                    result: entry.result.clone(),
                })
            };
        }
        if self.has_cache_for_other_profile_locked(&guard, user, normalized_keyword) {
            CacheLookup::Miss(CacheMissReason::ProfileChanged)
        } else {
            CacheLookup::Miss(CacheMissReason::NotFound)
        }
    }

    pub fn put(&self, user: &str, normalized_keyword: &str, profile_version: &str, now: i64, snippet: String, result: Value) {
        let key = Self::key(user, normalized_keyword, profile_version);
        let mut guard = self.inner.lock();
        guard.entries.insert(
            key,
            Entry {
                stored_at: now,
                snippet,
                result,
            },
        );
        self.evict_oldest_if_over_cap_locked(&mut guard);
    }

    fn evict_oldest_if_over_cap_locked(&self, guard: &mut Inner) {
        while guard.entries.len() > self.max_entries {
            let oldest_key = guard
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest_key {
                guard.entries.remove(&key);
            } else {
                break;
            }
        }
    }

    /// Whether an entry exists under any other profile version for this
    /// `(user, keyword)`, or under the legacy key shape.
    pub fn has_cache_for_other_profile(&self, user: &str, normalized_keyword: &str, profile_version: &str) -> bool {
        let guard = self.inner.lock();
        self.has_cache_for_other_profile_impl(&guard, user, normalized_keyword, profile_version)
    }

    fn has_cache_for_other_profile_locked(&self, guard: &Inner, user: &str, normalized_keyword: &str) -> bool {
        let prefix = format!("{user}||{normalized_keyword}||");
        if guard.entries.keys().any(|k| k.starts_with(&prefix)) {
            return true;
        }
        guard.entries.contains_key(&Self::legacy_key(user, normalized_keyword))
    }

    fn has_cache_for_other_profile_impl(&self, guard: &Inner, user: &str, normalized_keyword: &str, profile_version: &str) -> bool {
        let current = Self::key(user, normalized_keyword, profile_version);
        let prefix = format!("{user}||{normalized_keyword}||");
        let other_profile = guard
            .entries
            .keys()
            .any(|k| k.starts_with(&prefix) && k != &current);
        other_profile || guard.entries.contains_key(&Self::legacy_key(user, normalized_keyword))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}
