//! Text normalization applied to accepted queries before execution.

use regex::Regex;
use std::sync::LazyLock;

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)--.*$").expect("line comment regex is valid"));

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment regex is valid"));

/// Normalize query text: trim, drop one trailing `;`, strip comments, trim.
///
/// A single pass can expose another trailing `;` or splice a new comment
/// marker together, so passes repeat until the text is stable. Each pass only
/// removes characters, which bounds the loop.
pub fn sanitize(query: &str) -> String {
    let mut current = sanitize_once(query);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(query: &str) -> String {
    let trimmed = query.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
    let without_lines = LINE_COMMENT.replace_all(trimmed, "");
    let without_blocks = BLOCK_COMMENT.replace_all(&without_lines, "");
    without_blocks.trim().to_string()
}
