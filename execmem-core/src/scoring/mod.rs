//! Relevance scoring
//!
//! Re-ranks text-match candidates with eight independent factors:
//!
//! | Factor | Source |
//! |--------|--------|
//! | `ftsScore` | text-match rank |
//! | `recencyScore` | execution age |
//! | `successScore` | outcomes of executions with a similar prompt |
//! | `complexityScore` | stored complexity vs. estimated query complexity |
//! | `confidenceScore` | stored confidence |
//! | `contextScore` | tag and category overlap with the query |
//! | `frequencyScore` | outcomes of executions mentioning query words |
//! | `semanticScore` | token overlap with prompt and reasoning |
//!
//! Factors are combined with [`combine`] using a [`Weights`] snapshot owned
//! by the [`Scorer`]. Weight changes produce a new scorer; a scoring pass
//! always sees one consistent snapshot.

pub mod defaults;
pub mod factors;
pub mod snippet;
pub mod weights;

pub use factors::{jaccard_similarity, tokenize, OutcomeTally};
pub use weights::{combine, Factor, FactorScores, WeightUpdate, Weights};

use crate::error::Result;
use crate::search::TextMatch;
use crate::types::ExecutionMetadata;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Historical lookups the scorer needs beyond the candidate itself.
///
/// Errors returned here are storage failures and abort the scoring pass.
/// Missing data is not an error: an unknown execution has default metadata.
pub trait HistoryStore {
    /// Metadata for an execution, defaults when it has none.
    fn execution_metadata(&self, id: i64) -> Result<ExecutionMetadata>;

    /// Outcomes of the `limit` most recent executions whose prompt contains
    /// `fragment`.
    fn recent_outcomes_containing(&self, fragment: &str, limit: usize) -> Result<OutcomeTally>;

    /// Outcomes of all executions whose prompt contains any of `words`.
    fn outcomes_mentioning_any(&self, words: &[String]) -> Result<OutcomeTally>;
}

/// Whether a past execution is a worked solution or a cautionary failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Solution,
    Error,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Solution => "solution",
            ContextType::Error => "error",
        }
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub id: i64,
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub relevance_score: f64,
    pub factors: FactorScores,
    pub matched_content: String,
    pub context_type: ContextType,
    pub summary: String,
    #[serde(flatten)]
    pub metadata: ExecutionMetadata,
}

/// Query-derived values shared by every candidate in a pass.
#[derive(Debug, Clone)]
pub struct QueryProfile {
    /// Lowercased whitespace-separated words
    pub words: Vec<String>,
    /// Words long enough to count for the frequency factor
    pub significant_words: Vec<String>,
    /// Tokens for lexical similarity
    pub tokens: BTreeSet<String>,
    /// Estimated complexity (1..=10)
    pub complexity: u8,
}

impl QueryProfile {
    pub fn new(query: &str) -> Self {
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let significant_words = words
            .iter()
            .filter(|w| w.chars().count() > 3)
            .cloned()
            .collect();
        Self {
            words,
            significant_words,
            tokens: tokenize(query),
            complexity: factors::estimate_query_complexity(query),
        }
    }
}

/// Relevance scorer holding an immutable weight snapshot.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    weights: Arc<Weights>,
}

impl Scorer {
    pub fn new(weights: Weights) -> Self {
        Self {
            weights: Arc::new(weights),
        }
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// A scorer using this scorer's weights with `update` merged in.
    pub fn with_weights(&self, update: &WeightUpdate) -> Result<Self> {
        Ok(Self::new(self.weights.with_updates(update)?))
    }

    /// Score and rank candidates as of now.
    pub fn score<S: HistoryStore + ?Sized>(
        &self,
        store: &S,
        query: &str,
        candidates: Vec<TextMatch>,
    ) -> Result<Vec<ScoredResult>> {
        self.score_at(store, query, candidates, Utc::now())
    }

    /// Score and rank candidates as of `now`.
    ///
    /// Results are sorted by descending relevance; ties keep the lower
    /// (earlier inserted) id first.
    pub fn score_at<S: HistoryStore + ?Sized>(
        &self,
        store: &S,
        query: &str,
        candidates: Vec<TextMatch>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredResult>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let profile = QueryProfile::new(query);
        let frequency_tally = if profile.significant_words.is_empty() {
            OutcomeTally::default()
        } else {
            store.outcomes_mentioning_any(&profile.significant_words)?
        };

        let candidate_count = candidates.len();
        let mut results = Vec::with_capacity(candidate_count);
        for candidate in candidates {
            let metadata = store.execution_metadata(candidate.id)?;
            let fragment: String = candidate
                .prompt
                .chars()
                .take(factors::SIMILAR_PROMPT_PREFIX_CHARS)
                .collect();
            let similar =
                store.recent_outcomes_containing(&fragment, factors::SIMILAR_HISTORY_LIMIT)?;

            let scores = FactorScores {
                fts_score: factors::fts_score(candidate.rank),
                recency_score: factors::recency_score(candidate.timestamp, now),
                success_score: factors::success_score(similar, candidate.success),
                complexity_score: factors::complexity_score(
                    metadata.complexity,
                    profile.complexity,
                ),
                confidence_score: factors::confidence_score(Some(metadata.confidence)),
                context_score: factors::context_score(
                    &metadata.tags,
                    &metadata.category,
                    &profile.words,
                ),
                frequency_score: factors::frequency_score(frequency_tally),
                semantic_score: factors::semantic_score(
                    &profile.tokens,
                    &candidate.prompt,
                    candidate.reasoning.as_deref(),
                ),
            };

            results.push(self.build_result(&profile, candidate, metadata, scores));
        }

        results.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then(a.id.cmp(&b.id))
        });

        tracing::debug!(
            candidates = candidate_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scored candidates"
        );

        Ok(results)
    }

    fn build_result(
        &self,
        profile: &QueryProfile,
        candidate: TextMatch,
        metadata: ExecutionMetadata,
        scores: FactorScores,
    ) -> ScoredResult {
        let sections: Vec<&str> = [
            Some(candidate.prompt.as_str()),
            candidate.plan.as_deref(),
            candidate.reasoning.as_deref(),
            candidate.outcome.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        let matched_content =
            snippet::matched_content(&profile.words, &sections, &candidate.prompt);

        ScoredResult {
            id: candidate.id,
            relevance_score: combine(&scores, &self.weights),
            factors: scores,
            matched_content,
            context_type: if candidate.success {
                ContextType::Solution
            } else {
                ContextType::Error
            },
            summary: snippet::summarize(&candidate.prompt),
            prompt: candidate.prompt,
            timestamp: candidate.timestamp,
            success: candidate.success,
            metadata,
        }
    }
}
