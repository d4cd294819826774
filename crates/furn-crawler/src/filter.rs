//! Turns raw heading text into candidate product words.

use std::collections::{BTreeSet, HashSet};

use lazy_static::lazy_static;

/// Substrings that mark a word as a URL fragment rather than a product word.
pub const URL_FRAGMENTS: [&str; 8] = ["https", "www", "com", "net", "org", "html", "php", "asp"];

lazy_static! {
    static ref STOP_WORDS: HashSet<&'static str> = [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
        "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
        "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
        "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
        "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
        "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
        "for", "with", "about", "against", "between", "into", "through", "during", "before",
        "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
        "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
        "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
        "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can",
        "will", "just", "don", "should", "now",
    ]
    .into_iter()
    .collect();
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word.to_lowercase().as_str())
}

/// False when the word contains any of [`URL_FRAGMENTS`], ignoring case.
pub fn is_valid_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    !URL_FRAGMENTS.iter().any(|fragment| lower.contains(fragment))
}

fn is_candidate(word: &str) -> bool {
    word.chars().all(char::is_alphabetic) && !is_stop_word(word) && is_valid_word(word)
}

/// Strips punctuation, splits on whitespace and keeps the distinct words that
/// are alphabetic, not stop words and not URL fragments.
pub fn filter_text(text: &str) -> BTreeSet<String> {
    let cleaned = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>();

    cleaned
        .split_whitespace()
        .filter(|w| is_candidate(w))
        .map(String::from)
        .collect()
}
