//! Cleans model output so it can be spoken.
//!
//! Reasoning blocks, markdown, emoji and bracketed stage directions such as
//! `<laugh>` are removed and whitespace is collapsed.

use regex::Regex;
use std::sync::LazyLock;

const THINK_CLOSE: &str = "</think>";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("valid regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*|__(.*?)__").expect("valid regex"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*|\b_([^_]+)_\b").expect("valid regex"));
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*#+\s*").expect("valid regex"));
static BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*>\s*").expect("valid regex"));
static RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^-{3,}").expect("valid regex"));
static EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        "[",
        r"\x{1F600}-\x{1F64F}",
        r"\x{1F300}-\x{1F5FF}",
        r"\x{1F680}-\x{1F6FF}",
        r"\x{1F900}-\x{1F9FF}",
        r"\x{1F1E0}-\x{1F1FF}",
        r"\x{2600}-\x{27BF}",
        r"\x{FE0F}",
        "]+"
    ))
    .expect("valid regex")
});
static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Everything after the first `</think>`, or the whole text.
pub fn strip_think(text: &str) -> &str {
    match text.find(THINK_CLOSE) {
        Some(i) => &text[i + THINK_CLOSE.len()..],
        None => text,
    }
}

pub fn strip_markdown(text: &str) -> String {
    let text = CODE_FENCE.replace_all(text, "");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = BOLD.replace_all(&text, "$1$2");
    let text = ITALIC.replace_all(&text, "$1$2");
    let text = HEADER.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    RULE.replace_all(&text, "").into_owned()
}

/// Full clean-up applied to classifier replies and answers.
pub fn sanitize(text: &str) -> String {
    let text = strip_think(text);
    let text = EMOJI.replace_all(text, "");
    let text = strip_markdown(&text);
    let text = EXPRESSION.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_owned()
}
