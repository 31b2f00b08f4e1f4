//! Lightweight text heuristics used by the offline stages and for keywords.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+").expect("invalid sentence regex"));
static KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z]{4,}\b").expect("invalid keyword regex"));
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

const STOP_WORDS: &[&str] = &[
    "that", "this", "with", "from", "have", "been", "will", "their", "there", "what", "when",
    "where", "which", "while", "would", "could", "should", "they", "them", "into", "also",
    "more", "than", "these", "those", "such",
];

/// Sentences shorter than this are too thin to stand alone as a claim.
const MIN_SENTENCE_CHARS: usize = 20;

/// Pick up to `max_points` salient sentences, favouring early and medium-length ones.
pub fn extract_key_points(text: &str, max_points: usize) -> Vec<String> {
    if max_points == 0 {
        return Vec::new();
    }

    let sentences: Vec<&str> = SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() > MIN_SENTENCE_CHARS)
        .collect();
    let total = sentences.len() as f64;

    let mut scored: Vec<(&str, f64)> = sentences
        .iter()
        .take(max_points * 2)
        .enumerate()
        .map(|(idx, sentence)| {
            let position_score = 1.0 - idx as f64 / total;
            let length_score = (sentence.chars().count() as f64 / 100.0).min(1.0);
            (*sentence, position_score * 0.6 + length_score * 0.4)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(max_points)
        .map(|(sentence, _)| sentence.to_string())
        .collect()
}

/// Most frequent non-stop words of four or more letters; ties keep first appearance.
pub fn extract_keywords(text: &str, top_n: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for word in KEYWORD.find_iter(&lowered).map(|m| m.as_str()) {
        if STOP_WORDS.contains(&word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .take(top_n)
        .map(str::to_string)
        .collect()
}

/// First sentence of `text` including its terminator, or the trimmed text if none.
pub fn first_sentence(text: &str) -> String {
    let trimmed = text.trim();
    match SENTENCE_BREAK.find(trimmed) {
        Some(m) => trimmed[..m.end()].trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXCERPT: &str = "Quantum computers use quantum mechanical phenomena to solve complex \
        problems faster than classical computers. They leverage qubits instead of traditional bits.";

    #[test]
    fn key_points_prefer_early_sentences() {
        let points = extract_key_points(EXCERPT, 1);
        assert_eq!(points.len(), 1);
        assert!(points[0].starts_with("Quantum computers use"));
    }

    #[test]
    fn key_points_skip_short_fragments() {
        assert!(extract_key_points("Too short. Tiny!", 3).is_empty());
        assert!(extract_key_points(EXCERPT, 0).is_empty());
    }

    #[test]
    fn keywords_rank_by_frequency_then_first_seen() {
        let keywords = extract_keywords(
            "Quantum qubits. Quantum error correction. Qubits are fragile; quantum again.",
            3,
        );
        assert_eq!(keywords, vec!["quantum", "qubits", "error"]);
    }

    #[test]
    fn keywords_drop_stop_words() {
        let keywords = extract_keywords("This would have been there with that", 10);
        assert!(keywords.is_empty());
    }

    #[test]
    fn first_sentence_and_truncation() {
        assert_eq!(
            first_sentence("Fragile systems. Need cooling."),
            "Fragile systems."
        );
        assert_eq!(first_sentence("no terminator"), "no terminator");
        assert_eq!(truncate_chars("héllo world", 5), "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
    }
}
