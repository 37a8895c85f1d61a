//! Text normalization for speech output.
//!
//! Reply text frequently arrives as markdown. Formatting markers read badly
//! when spoken, so they are stripped before the text reaches a provider:
//! code blocks are removed outright, inline markers are unwrapped, and
//! whitespace is collapsed. The result always ends in terminal punctuation
//! so synthesis engines produce a natural final cadence.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static UNDERSCORE_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"__?([^_]+)__?").unwrap());
static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*•]|\d+\.)\s+").unwrap());
static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static REPEATED_PERIODS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(\s*\.)+").unwrap());

/// Normalize text for synthesis. Returns an empty string for input with no
/// speakable content.
pub fn clean_for_speech(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let text = CODE_BLOCK.replace_all(text, "");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = UNDERSCORE_EMPHASIS.replace_all(&text, "$1");
    let text = HEADER.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = LIST_MARKER.replace_all(&text, "");
    // Line breaks become sentence pauses, then everything collapses to
    // single spaces.
    let text = NEWLINES.replace_all(&text, ". ");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = REPEATED_PERIODS.replace_all(&text, ".");

    let mut text = text.trim().to_string();
    if let Some(last) = text.chars().last()
        && !matches!(last, '.' | '!' | '?')
    {
        text.push('.');
    }
    text
}
