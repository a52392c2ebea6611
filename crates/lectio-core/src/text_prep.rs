//! Paragraph text preparation for the synthesis path.
//!
//! Pure functions, no I/O. Article paragraphs are mostly prose, but crawled
//! content occasionally keeps inline markdown that reads badly when spoken.

use regex::Regex;
use std::sync::LazyLock;

static RE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static RE_BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Reduce inline markdown to plain text and collapse whitespace.
pub fn clean_paragraph_text(text: &str) -> String {
    let mut c = RE_BOLD.replace_all(text, "$1").into_owned();
    c = RE_ITALIC.replace_all(&c, "$1").into_owned();
    c = RE_LINK.replace_all(&c, "$1").into_owned();
    c = RE_BARE_URL.replace_all(&c, "").into_owned();
    c = RE_WHITESPACE.replace_all(&c, " ").into_owned();
    c.trim().to_string()
}

/// Whether cleaned text is worth sending to the synthesizer.
pub fn is_narratable(cleaned: &str) -> bool {
    cleaned.chars().count() >= 2 && cleaned.chars().any(|c| c.is_alphanumeric())
}
