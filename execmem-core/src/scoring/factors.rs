//! Individual relevance factors.
//!
//! Every function here is pure and returns a value in [0, 1].

use super::defaults;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Recency decay constant in days: score is `exp(-age / RECENCY_DECAY_DAYS)`.
pub const RECENCY_DECAY_DAYS: f64 = 30.0;

/// A successful candidate never scores below this on the success factor.
pub const SUCCESS_FLOOR: f64 = 0.8;

/// Similar past executions considered by the success factor.
pub const SIMILAR_HISTORY_LIMIT: usize = 10;

/// Prompt prefix (in characters) used to find similar past executions.
pub const SIMILAR_PROMPT_PREFIX_CHARS: usize = 50;

const ACTION_VERBS: [&str; 6] = ["implement", "create", "build", "design", "optimize", "analyze"];
const TECHNICAL_NOUNS: [&str; 5] = ["algorithm", "database", "system", "architecture", "performance"];

/// Tally of outcomes among past executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutcomeTally {
    pub total: u64,
    pub successes: u64,
}

impl OutcomeTally {
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.successes as f64 / self.total as f64)
        }
    }
}

/// Rescale a text-match rank (typically in (-10, 0]) into [0, 1].
pub fn fts_score(rank: f64) -> f64 {
    if !rank.is_finite() {
        return 0.0;
    }
    (1.0 + rank / 10.0).clamp(0.0, 1.0)
}

/// Exponential decay by age. Timestamps in the future count as age zero.
pub fn recency_score(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_ms = now.signed_duration_since(timestamp).num_milliseconds().max(0);
    let age_days = age_ms as f64 / 86_400_000.0;
    (-age_days / RECENCY_DECAY_DAYS).exp()
}

/// Success rate among similar past executions, adjusted by the candidate's
/// own outcome: floored at [`SUCCESS_FLOOR`] when it succeeded, halved when
/// it failed.
pub fn success_score(similar: OutcomeTally, candidate_succeeded: bool) -> f64 {
    let rate = similar.rate().unwrap_or(defaults::SUCCESS_RATE);
    if candidate_succeeded {
        rate.max(SUCCESS_FLOOR)
    } else {
        rate * 0.5
    }
}

/// Heuristic complexity (1..=10) of a free-text query.
pub fn estimate_query_complexity(query: &str) -> u8 {
    let word_count = query.split_whitespace().count();
    let mut complexity = (word_count / 2).clamp(1, 10);

    let lower = query.to_lowercase();
    if ACTION_VERBS.iter().any(|verb| lower.contains(verb)) {
        complexity += 2;
    }
    if TECHNICAL_NOUNS.iter().any(|noun| lower.contains(noun)) {
        complexity += 1;
    }

    complexity.min(10) as u8
}

/// Closeness of the stored complexity to the query's estimated complexity.
pub fn complexity_score(stored: u8, estimated: u8) -> f64 {
    let diff = (stored as f64 - estimated as f64).abs();
    (1.0 - diff / 10.0).max(0.0)
}

/// Confidence clamped into range.
pub fn confidence_score(confidence: Option<f64>) -> f64 {
    confidence
        .filter(|c| c.is_finite())
        .unwrap_or(defaults::CONFIDENCE)
        .clamp(0.0, 1.0)
}

/// Tag and category overlap with the query words.
///
/// 0.6 times the fraction of tags that overlap a query word (substring in
/// either direction), plus 0.4 when a query word appears in the category.
pub fn context_score(tags: &[String], category: &str, query_words: &[String]) -> f64 {
    if query_words.is_empty() {
        return 0.0;
    }

    let tag_part = if tags.is_empty() {
        0.0
    } else {
        let overlapping = tags
            .iter()
            .map(|tag| tag.to_lowercase())
            .filter(|tag| !tag.is_empty())
            .filter(|tag| {
                query_words
                    .iter()
                    .any(|word| tag.contains(word.as_str()) || word.contains(tag.as_str()))
            })
            .count();
        overlapping as f64 / tags.len() as f64
    };

    let category = category.to_lowercase();
    let category_part = if query_words
        .iter()
        .any(|word| category.contains(word.as_str()))
    {
        0.4
    } else {
        0.0
    };

    (tag_part * 0.6 + category_part).min(1.0)
}

/// Success rate among past executions whose prompt mentions a query word.
pub fn frequency_score(matching: OutcomeTally) -> f64 {
    matching.rate().unwrap_or(defaults::FREQUENCY)
}

/// Lexical similarity of the query to the prompt (0.7) and reasoning (0.3).
pub fn semantic_score(
    query_tokens: &BTreeSet<String>,
    prompt: &str,
    reasoning: Option<&str>,
) -> f64 {
    let prompt_tokens = tokenize(prompt);
    let reasoning_tokens = tokenize(reasoning.unwrap_or(""));
    0.7 * jaccard_similarity(query_tokens, &prompt_tokens)
        + 0.3 * jaccard_similarity(query_tokens, &reasoning_tokens)
}

/// Lowercased word tokens longer than two characters.
///
/// Non-word characters separate tokens.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity; two empty sets are identical.
pub fn jaccard_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}
