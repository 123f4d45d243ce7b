//! Text match provider
//!
//! Full-text search yields the candidate set that the relevance scorer
//! re-ranks. The provider's `rank` is monotonic with "more negative means
//! less relevant"; [`rank_from_bm25`] maps SQLite's bm25 values (where more
//! negative means *more* relevant) onto that convention within (-10, 0].

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A full-text match for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextMatch {
    pub id: i64,
    /// Match strength; closer to 0 is stronger
    pub rank: f64,
    pub prompt: String,
    pub plan: Option<String>,
    pub reasoning: Option<String>,
    pub outcome: Option<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Source of candidate executions for a query.
pub trait TextMatchProvider {
    /// Return at most `limit` matches, strongest first.
    fn find_matches(&self, query: &str, limit: usize) -> Result<Vec<TextMatch>>;
}

/// Build an FTS5 MATCH expression from free text.
///
/// Every word is quoted so punctuation in user queries cannot be read as
/// query syntax; words are OR-ed to keep recall high, since ranking happens
/// afterwards. Returns `None` when the query has no searchable words.
pub fn build_match_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{}\"", w.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Map a bm25 score onto the provider rank convention.
pub fn rank_from_bm25(bm25: f64) -> f64 {
    if !bm25.is_finite() {
        return -10.0;
    }
    -10.0 / (1.0 + bm25.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_match_query_quotes_terms() {
        assert_eq!(
            build_match_query("Parser bug!").as_deref(),
            Some("\"parser\" OR \"bug\"")
        );
        assert_eq!(
            build_match_query("what's \"NEAR\"(x)").as_deref(),
            Some("\"what\" OR \"s\" OR \"near\" OR \"x\"")
        );
    }

    #[test]
    fn test_build_match_query_empty() {
        assert_eq!(build_match_query(""), None);
        assert_eq!(build_match_query("  ?! -- "), None);
    }

    #[test]
    fn test_rank_from_bm25_is_monotonic() {
        let weak = rank_from_bm25(-0.1);
        let strong = rank_from_bm25(-8.0);
        assert!(strong > weak);
        assert!(strong <= 0.0 && weak > -10.0);
        assert_eq!(rank_from_bm25(0.0), -10.0);
        assert_eq!(rank_from_bm25(f64::NAN), -10.0);
    }
}
