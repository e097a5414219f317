//! Text Normalizer — turns scraped page text into a plain-text document for extraction.
//!
//! Total function: every input yields a string (possibly empty). No markup, links or
//! symbols other than `. , ! ?` survive.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum number of characters shown in a document preview.
pub const PREVIEW_CHARS: usize = 500;

static RE_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").unwrap());

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());

static RE_DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s.,!?]").unwrap());

/// Normalizes raw page text.
///
/// 1. strip markup tags
/// 2. strip `http(s)://` and `www.` tokens
/// 3. drop every character outside letters, digits, whitespace and `. , ! ?`
/// 4. strip `www.` tokens again (step 3 can glue one together, e.g. `w-ww.site`)
/// 5. collapse whitespace runs and trim
pub fn normalize(raw_text: &str) -> String {
    let text = RE_MARKUP.replace_all(raw_text, "");
    let text = RE_URL.replace_all(&text, "");
    let text = RE_DISALLOWED.replace_all(&text, "");
    let text = RE_URL.replace_all(&text, "");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the first `max_chars` characters of a document, never splitting a code point.
pub fn document_preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_removes_markup() {
        assert_eq!(normalize("<p>Hello</p> world"), "Hello world");
    }

    #[test]
    fn test_removes_urls() {
        let input = "Apply at https://careers.example.com/jobs?id=4 or www.example.com today";
        assert_eq!(normalize(input), "Apply at or today");
    }

    #[test]
    fn test_keeps_basic_punctuation_only() {
        assert_eq!(
            normalize("Senior Engineer (Rust) — 5+ years! Remote, yes?"),
            "Senior Engineer Rust 5 years! Remote, yes?"
        );
    }

    #[test]
    fn test_collapses_whitespace_and_trims() {
        assert_eq!(normalize("\n\t  Data   Engineer \r\n  Python  "), "Data Engineer Python");
    }

    #[test]
    fn test_empty_and_symbol_only_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("<div></div> @#$%^&*"), "");
    }

    #[test]
    fn test_url_glued_by_symbol_removal_is_stripped() {
        let once = normalize("visit w-ww.example.com now");
        assert_eq!(once, "visit now");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_multiline_markup_tags_are_left_as_text() {
        // A tag split across lines is not matched by the markup pattern; its symbols
        // are still removed by the character filter.
        assert_eq!(normalize("<a\nhref>Jobs"), "a hrefJobs");
    }

    #[test]
    fn test_document_preview_is_char_safe() {
        let text = "héllo wörld";
        assert_eq!(document_preview(text, 4), "héll");
        assert_eq!(document_preview(text, 100), text);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(input in "\\PC{0,200}") {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_is_idempotent_on_markup_like_input(
            input in "[<>a-z0-9 ./:w!?,@#\\-\n]{0,120}"
        ) {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_output_uses_allowed_characters(input in "\\PC{0,200}") {
            let out = normalize(&input);
            prop_assert!(out
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == ' ' || ".,!?".contains(c)));
            prop_assert!(!out.contains("  "));
            prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}
