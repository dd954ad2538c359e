//! Keyword normalization and mojibake repair.
//!
//! Two concerns kept in one module because both operate on raw client
//! text before it reaches retrieval: stabilizing keyword strings for
//! cache keys, and recovering text whose UTF-8 bytes were accidentally
//! re-decoded through Latin-1 or CP-1252 somewhere upstream.


use std::collections::HashSet;

/// Separator characters ignored when measuring a keyword's `?`-ratio.
const SEPARATOR_CHARS: &[char] = &[' ', ',', '，', ';', '；', '|', '/', '\t', '\r', '\n'];

/// Honorifics/interjections that are never useful retrieval keywords on
/// their own.
const STOP_TOKENS: &[&str] = &[
    "哥哥", "哥", "类", "神代", "喵", "猫咪", "小猫咪", "宝宝", "亲", "抱", "mua", "啾", "嘿嘿",
];

/// Common filler words that survive CJK-run extraction but carry no
/// retrieval signal.
const FILLER_WORDS: &[&str] = &[
    "就是", "然后", "那个", "这个", "怎么", "为什么", "可以", "不要", "不是",
];

/// Markers of small-talk/affectionate chitchat, used to pick between the
/// two emotional-tone fallback keywords.
pub const EMO_MARKERS: &[&str] = &[
    "哥哥", "类", "喵", "猫咪", "小猫咪", "宝宝", "亲", "抱", "mua", "啾", "嘿嘿", "🥺", "😙",
    "😗", "😽", "😭", "🥰", "💖", "🖤",
];

/// Normalize separators, split, trim, dedupe (first-seen order), rejoin
/// with `,`. Empty input yields empty output.
pub fn normalize_keyword(raw: &str) -> String {
    let kw = raw.trim();
    if kw.is_empty() {
        return String::new();
    }
    let unified = kw.replace('，', ",").replace(';', ",").replace('；', ",");
    let mut seen = HashSet::new();
    let mut parts = Vec::new();
    for part in unified.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if seen.insert(part) {
            parts.push(part);
        }
    }
    parts.join(",")
}

/// A keyword is garbled iff non-empty and its ratio of `?` to
/// non-separator characters is ≥ 0.4.
pub fn is_garbled_keyword(keyword: &str) -> bool {
    let kw = keyword.trim();
    if kw.is_empty() {
        return false;
    }
    let q = kw.chars().filter(|&c| c == '?').count();
    if q == 0 {
        return false;
    }
    let total = kw.chars().filter(|c| !SEPARATOR_CHARS.contains(c)).count();
    if total == 0 {
        return true;
    }
    (q as f64 / total as f64) >= 0.4
}

/// Locate maximal CJK runs (U+4E00..=U+9FFF) in `text`, in order.
fn find_cjk_runs(text: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    let mut last_end = 0;
    for (i, ch) in text.char_indices() {
        if ('\u{4E00}'..='\u{9FFF}').contains(&ch) {
            if start.is_none() {
                start = Some(i);
            }
            last_end = i + ch.len_utf8();
        } else if let Some(s) = start.take() {
            runs.push(&text[s..last_end]);
        }
    }
    if let Some(s) = start {
        runs.push(&text[s..last_end]);
    }
    runs
}

/// Derive up to `k` CJK keywords from free text: maximal CJK runs, skip
/// stop-tokens/fillers, require length ≥ 2, dedupe.
pub fn derive_cjk_keyword_from_text(text: &str, k: usize) -> String {
    let t = text.trim();
    if t.is_empty() {
        return String::new();
    }
    let mut cands: Vec<&str> = Vec::new();
    for seq in find_cjk_runs(t) {
        let seq = seq.trim();
        if seq.is_empty() || STOP_TOKENS.contains(&seq) || FILLER_WORDS.contains(&seq) {
            continue;
        }
        if seq.chars().count() < 2 {
            continue;
        }
        if !cands.contains(&seq) {
            cands.push(seq);
        }
        if cands.len() >= k {
            break;
        }
    }
    cands.join(",")
}

/// Whether `text` contains any small-talk/emotional marker.
pub fn is_emotional_chitchat(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() {
        return false;
    }
    EMO_MARKERS.iter().any(|m| t.contains(m))
}

/// The fixed emotional-tone fallback keyword pair, chosen by whether the
/// raw text looks like affectionate chitchat.
pub fn emotional_fallback_keyword(text: &str) -> String {
    if is_emotional_chitchat(text) {
        "哥哥,小猫咪".to_string()
    } else {
        "哥哥,撒娇".to_string()
    }
}

/// Resolve a primary retrieval keyword: use the supplied keyword unless
/// it is missing or garbled, in which case derive one from free text;
/// if that still comes up empty, fall back to the emotional-tone pair.
/// Callers are expected to `normalize_keyword` the result.
pub fn resolve_primary_keyword(raw_keyword: &str, text: &str, garbled_repair_enabled: bool) -> String {
    let mut keyword = raw_keyword.trim().to_string();
    if keyword.is_empty() || (garbled_repair_enabled && is_garbled_keyword(&keyword)) {
        keyword = derive_cjk_keyword_from_text(text, 2);
    }
    if keyword.is_empty() {
        keyword = emotional_fallback_keyword(text);
    }
    keyword
}

const MOJIBAKE_MARKER_CHARS: &[char] = &['æ', 'å', 'Ã', 'Â', 'ð'];

fn is_c1_control(ch: char) -> bool {
    ('\u{0080}'..='\u{009F}').contains(&ch)
}

fn strip_c1_controls(text: &str) -> String {
    text.chars().filter(|c| !is_c1_control(*c)).collect()
}

fn count_c1_controls(text: &str) -> usize {
    text.chars().filter(|c| is_c1_control(*c)).count()
}

fn count_mojibake_markers(text: &str) -> usize {
    text.chars()
        .filter(|c| MOJIBAKE_MARKER_CHARS.contains(c))
        .count()
}

fn is_latin1_supplement(ch: char) -> bool {
    ('\u{00A0}'..='\u{00FF}').contains(&ch)
}

/// Count maximal runs (length ≥ 2) of Latin-1-supplement characters —
/// the shape a re-decoded multi-byte UTF-8 sequence takes under Latin-1.
fn count_bad_latin_runs(text: &str) -> usize {
    let mut runs = 0;
    let mut run_len = 0;
    for ch in text.chars() {
        if is_latin1_supplement(ch) {
            run_len += 1;
        } else {
            if run_len >= 2 {
                runs += 1;
            }
            run_len = 0;
        }
    }
    if run_len >= 2 {
        runs += 1;
    }
    runs
}

fn has_mojibake_indicators(text: &str) -> bool {
    count_mojibake_markers(text) > 0 || count_c1_controls(text) > 0 || count_bad_latin_runs(text) > 0
}

fn encode_latin1(s: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    for ch in s.chars() {
        let cp = ch as u32;
        if cp > 0xFF {
            return None;
        }
        out.push(cp as u8);
    }
    Some(out)
}

/// Code points CP1252 maps onto the 0x80..=0x9F byte range (Latin-1
/// leaves these as C1 controls).
const CP1252_SPECIALS: &[(u8, char)] = &[
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

fn encode_cp1252(s: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    'chars: for ch in s.chars() {
        let cp = ch as u32;
        if cp <= 0xFF && !(0x80..=0x9F).contains(&cp) {
            out.push(cp as u8);
            continue;
        }
        for &(byte, special) in CP1252_SPECIALS {
            if special == ch {
                out.push(byte);
                continue 'chars;
            }
        }
        return None;
    }
    Some(out)
}

fn decode_utf8_best_effort(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// `(cjk_count, -mojibake_markers, -(ctrl+replacement), -bad_latin_runs, -replacement_count)`,
/// compared lexicographically; larger is better.
fn candidate_score(text: &str) -> (i64, i64, i64, i64, i64) {
    let cjk = text
        .chars()
        .filter(|c| ('\u{4E00}'..='\u{9FFF}').contains(c))
        .count() as i64;
    let markers = count_mojibake_markers(text) as i64;
    let ctrl = count_c1_controls(text) as i64;
    let replacement = text.chars().filter(|&c| c == '\u{FFFD}').count() as i64;
    let bad_runs = count_bad_latin_runs(text) as i64;
    (cjk, -markers, -(ctrl + replacement), -bad_runs, -replacement)
}

/// Repair text whose UTF-8 bytes were mis-decoded through Latin-1 or
/// CP-1252. Returns the input unchanged (apart from C1-control cleanup)
/// when it shows no mojibake indicators — the anti-overrepair rule.
pub fn repair_mojibake(text: &str) -> String {
    let cleaned = strip_c1_controls(text);
    if !has_mojibake_indicators(&cleaned) {
        return cleaned;
    }

    let initial_markers = count_mojibake_markers(&cleaned);
    let max_rounds = 2 + usize::from(initial_markers > 2) + usize::from(initial_markers > 5);

    let mut candidates: Vec<String> = vec![cleaned.clone()];
    let mut seen: HashSet<String> = candidates.iter().cloned().collect();

    for _ in 0..max_rounds {
        let mut fresh = Vec::new();
        for candidate in &candidates {
            for encode in [encode_latin1 as fn(&str) -> Option<Vec<u8>>, encode_cp1252] {
                if let Some(bytes) = encode(candidate) {
                    let decoded = decode_utf8_best_effort(&bytes);
                    if seen.insert(decoded.clone()) {
                        fresh.push(decoded);
                    }
                }
            }
        }
        if fresh.is_empty() {
            break;
        }
        candidates.extend(fresh);
    }

    candidates
        .into_iter()
        .max_by_key(|c| candidate_score(c))
        .unwrap_or(cleaned)
}

/// Apply [`repair_mojibake`] recursively to every string inside a JSON
/// value — used on opaque RAG/LLM output before it is surfaced.
pub fn repair_mojibake_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => *s = repair_mojibake(s),
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                repair_mojibake_json(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                repair_mojibake_json(v);
            }
        }
        _ => {}
    }
}
