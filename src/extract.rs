//! Final-answer extraction from free-form model output.
//!
//! Models are instructed to wrap their final answer as `<< answer >>`. The
//! text is first stripped of markdown decorations, then the first non-empty
//! delimited span is returned verbatim (trimmed). Nothing here interprets the
//! answer itself; comparing numbers or paraphrases is the judge's job.

use std::sync::OnceLock;

use regex::Regex;

/// Answer recorded when a response carries no delimited final answer.
pub const UNKNOWN_ANSWER: &str = "I don't know";

struct Patterns {
    link: Regex,
    bare_url: Regex,
    line_marker: Regex,
    answer: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        link: Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid link pattern"),
        bare_url: Regex::new(r"\s*\(https?:[^)]+\)").expect("valid url pattern"),
        line_marker: Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]*|(?:[-*+]|\d+[.)])[ \t]+)+")
            .expect("valid line marker pattern"),
        answer: Regex::new(r"(?s)<<\s*(.*?)\s*>>").expect("valid answer pattern"),
    })
}

/// Strips markdown decorations and collapses whitespace.
///
/// Links keep their label, headings and list markers are dropped, emphasis
/// and inline code markers are removed. Each line has its whitespace runs
/// collapsed to a single space, blank lines are dropped and the remaining
/// lines are joined with `\n`. Applied until the text stops changing, so
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut current = normalize_once(text);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(text: &str) -> String {
    let p = patterns();
    let text = p.link.replace_all(text, "$1");
    let text = p.bare_url.replace_all(&text, "");
    let text = p.line_marker.replace_all(&text, "");
    let text = text.replace("**", "").replace(['*', '`'], "");

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns the first non-empty `<< ... >>` span of the normalized text.
pub fn find_answer(text: &str) -> Option<String> {
    let normalized = normalize(text);
    patterns()
        .answer
        .captures_iter(&normalized)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|answer| !answer.is_empty())
        .map(str::to_string)
}

/// Extracts the final answer, falling back to [`UNKNOWN_ANSWER`].
pub fn extract_answer(text: &str) -> String {
    find_answer(text).unwrap_or_else(|| UNKNOWN_ANSWER.to_string())
}

/// Collapses every whitespace run (newlines included) into one space.
pub fn clean_trace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
