//! Query facade over the store, scorer, and aggregator
//!
//! [`ExecutionMemory`] is the API surface callers use: record executions,
//! search them (raw or re-ranked), inspect statistics and analytics, and
//! manage the relevance weights.

use crate::analytics::{compute_report, AnalyticsReport, Overview};
use crate::config::{Config, SearchConfig};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::scoring::{ScoredResult, Scorer, WeightUpdate, Weights};
use crate::search::{TextMatch, TextMatchProvider};
use crate::types::{ExecutionRecord, MetricEntry, NewExecution};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::RwLock;

/// An execution together with all of its decoded metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionDetails {
    #[serde(flatten)]
    pub execution: ExecutionRecord,
    pub metrics: Vec<MetricEntry>,
}

/// Search limits applied by the facade
#[derive(Debug, Clone, Copy)]
struct Limits {
    default_limit: usize,
    candidate_limit: usize,
}

impl From<&SearchConfig> for Limits {
    fn from(search: &SearchConfig) -> Self {
        Self {
            default_limit: search.default_limit,
            candidate_limit: search.candidate_limit,
        }
    }
}

/// Execution memory backed by a SQLite store.
pub struct ExecutionMemory {
    db: Database,
    scorer: RwLock<Scorer>,
    limits: Limits,
}

impl ExecutionMemory {
    /// Open the configured database, run migrations, and apply configured weights.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.resolved_database_path())?;
        db.migrate()?;

        let mut memory = Self::new(db, Scorer::new(config.scoring.effective_weights()?));
        memory.limits = Limits::from(&config.search);
        Ok(memory)
    }

    /// Wrap an already migrated database.
    pub fn new(db: Database, scorer: Scorer) -> Self {
        Self {
            db,
            scorer: RwLock::new(scorer),
            limits: Limits::from(&SearchConfig::default()),
        }
    }

    /// In-memory store with default weights (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        db.migrate()?;
        Ok(Self::new(db, Scorer::default()))
    }

    /// The underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Limit used when the caller does not pass one
    pub fn default_limit(&self) -> usize {
        self.limits.default_limit
    }

    // ============================================
    // Recording and lookup
    // ============================================

    pub fn record_execution(&self, execution: &NewExecution) -> Result<i64> {
        self.db.insert_execution(execution)
    }

    /// Look up one execution with its metrics.
    pub fn get_execution(&self, id: i64) -> Result<ExecutionDetails> {
        let execution = self.db.get_execution(id)?.ok_or(Error::RecordNotFound(id))?;
        let metrics = self.db.query_metrics(id, None)?;
        Ok(ExecutionDetails { execution, metrics })
    }

    // ============================================
    // Search
    // ============================================

    /// Raw text matches in index order, without re-ranking.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<TextMatch>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.db.find_matches(query, limit)
    }

    /// Re-ranked search using the current weights.
    pub fn search_advanced(&self, query: &str, limit: usize) -> Result<Vec<ScoredResult>> {
        let scorer = self.scorer();
        self.search_advanced_with(&scorer, query, limit)
    }

    /// Re-ranked search with an explicit scorer, leaving the shared weights alone.
    pub fn search_advanced_with(
        &self,
        scorer: &Scorer,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let fetch = self.limits.candidate_limit.max(limit);
        let candidates = self.db.find_matches(query, fetch)?;
        tracing::debug!(query, candidates = candidates.len(), "Scoring candidates");

        let mut results = scorer.score(&self.db, query, candidates)?;
        results.truncate(limit);
        Ok(results)
    }

    // ============================================
    // Statistics
    // ============================================

    pub fn get_stats(&self) -> Result<Overview> {
        self.db.get_overview()
    }

    pub fn get_analytics(&self) -> Result<AnalyticsReport> {
        let snapshot = self.db.analytics_snapshot()?;
        Ok(compute_report(&snapshot, Utc::now()))
    }

    // ============================================
    // Weights
    // ============================================

    /// Snapshot of the scorer currently used by [`Self::search_advanced`].
    pub fn scorer(&self) -> Scorer {
        self.scorer.read().unwrap().clone()
    }

    pub fn get_weights(&self) -> Weights {
        self.scorer().weights().clone()
    }

    /// Merge `update` into the current weights without renormalizing.
    ///
    /// Searches already in flight keep the snapshot they started with.
    pub fn update_weights(&self, update: &WeightUpdate) -> Result<Weights> {
        let mut scorer = self.scorer.write().unwrap();
        let next = scorer.with_weights(update)?;
        let weights = next.weights().clone();
        *scorer = next;

        tracing::info!(sum = weights.sum(), "Updated relevance weights");
        Ok(weights)
    }

    // ============================================
    // Maintenance
    // ============================================

    /// Delete executions older than `retention_days`. Returns the number deleted.
    pub fn cleanup(&self, retention_days: u32) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        self.db.delete_older_than(cutoff)
    }

    /// Number of metric entries whose execution is gone.
    pub fn check_integrity(&self) -> Result<i64> {
        self.db.count_orphaned_metrics()
    }

    pub fn repair(&self) -> Result<usize> {
        self.db.repair_orphaned_metrics()
    }
}
