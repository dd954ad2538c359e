//! Keyword extraction from the last user turn, for the `gateway_ctx`
//! call the orchestrator makes on the caller's behalf. Distinct from
//! [`context_core::keyword::resolve_primary_keyword`], which resolves a
//! keyword the *client* already supplied: here there is no client
//! keyword at all, only free text, so the policy starts from small-talk
//! detection rather than garble detection.

use context_core::keyword::derive_cjk_keyword_from_text;

/// Fixed technical-token patterns. Presence of any one routes extraction
/// through CJK-run mining instead of the neutral/emotional fallback.
const TECHNICAL_TOKENS: &[&str] = &[
    "报错", "代码", "数据库", "接口", "部署", "服务器", "配置", "日志", "崩溃", "性能", "内存", "编译",
];

const SMALL_TALK_MARKERS: &[&str] = &["哥哥", "喵", "猫咪", "小猫咪", "宝宝", "亲亲", "抱抱", "撒娇"];

/// Guarantees every returned keyword carries at least one stable token a
/// downstream cache/anchor call can key off of.
const SENTINEL_TOKEN: &str = "ctx";

const NEUTRAL_FALLBACK: &str = "日常,聊天";
const SMALL_TALK_PAIR: &str = "撒娇,猫咪";

fn has_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| text.contains(p))
}

/// Extract a retrieval keyword from the user's last message: small-talk
/// detection first, then technical-token-gated CJK mining, falling back
/// to a neutral pair. Always ensures [`SENTINEL_TOKEN`] is present.
pub fn extract_keyword(last_user_text: &str) -> String {
    let text = last_user_text.trim();
    if text.is_empty() {
        return with_sentinel(NEUTRAL_FALLBACK);
    }

    if has_any(text, SMALL_TALK_MARKERS) && !has_any(text, TECHNICAL_TOKENS) {
        return with_sentinel(SMALL_TALK_PAIR);
    }

    if has_any(text, TECHNICAL_TOKENS) {
        let mined = derive_cjk_keyword_from_text(text, 3);
        if !mined.is_empty() {
            return with_sentinel(&mined);
        }
    }

    with_sentinel(NEUTRAL_FALLBACK)
}

fn with_sentinel(keyword: &str) -> String {
    if keyword.split(',').any(|part| part == SENTINEL_TOKEN) {
        keyword.to_string()
    } else {
        format!("{keyword},{SENTINEL_TOKEN}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_talk_text_gets_fixed_pair() {
        let kw = extract_keyword("哥哥喵～今天也要抱抱");
        assert!(kw.contains("撒娇"));
        assert!(kw.contains("猫咪"));
        assert!(kw.contains(SENTINEL_TOKEN));
    }

    #[test]
    fn technical_text_mines_cjk_runs() {
        let kw = extract_keyword("服务器一直报错，数据库连不上");
        assert!(kw.contains(SENTINEL_TOKEN));
        assert!(!kw.contains("日常"));
    }

    #[test]
    fn empty_text_falls_back_to_neutral() {
        let kw = extract_keyword("");
        assert_eq!(kw, format!("{NEUTRAL_FALLBACK},{SENTINEL_TOKEN}"));
    }

    #[test]
    fn sentinel_not_duplicated_when_already_present() {
        let kw = with_sentinel("foo,ctx");
        assert_eq!(kw, "foo,ctx");
    }
}
