//! Database repository layer
//!
//! Provides insert and query operations for executions and their metrics,
//! plus the full-text and history lookups used by the scorer.

use crate::analytics::{AnalyticsSnapshot, ExecutionDigest, Overview};
use crate::error::{Error, Result};
use crate::scoring::{HistoryStore, OutcomeTally};
use crate::search::{build_match_query, rank_from_bm25, TextMatch, TextMatchProvider};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

/// Metric keys loaded for analytics
const ANALYTICS_KEYS: [&str; 4] = [
    keys::CATEGORY,
    keys::TAGS,
    keys::COMPLEXITY,
    keys::MEMORY_USAGE,
];

/// Format a timestamp for storage.
///
/// Fixed-width UTC so stored timestamps order correctly as text.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!(value = s, "Unparseable stored timestamp");
            DateTime::<Utc>::UNIX_EPOCH
        })
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `ESCAPE '\'`.
fn like_contains(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let unavailable = |message: String| Error::StorageUnavailable {
            path: path.to_path_buf(),
            message,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| unavailable(e.to_string()))?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )
        .map_err(|e| unavailable(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Opened database");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Execution operations
    // ============================================

    /// Insert an execution and its metrics as one transaction.
    ///
    /// Returns the assigned id. Nothing is written if any part fails.
    pub fn insert_execution(&self, execution: &NewExecution) -> Result<i64> {
        execution.validate()?;

        let timestamp = execution.timestamp.unwrap_or_else(Utc::now);
        let actions = serde_json::to_string(&execution.actions)?;
        let code_changes = execution
            .code_changes
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let metrics = execution.metric_entries();
        let duration_ms = i64::try_from(execution.duration_ms)
            .map_err(|_| Error::InvalidRecord("duration_ms out of range".to_string()))?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO executions (timestamp, prompt, plan, reasoning, actions, code_changes,
                                    outcome, success, duration_ms, model, tokens)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                ts(&timestamp),
                execution.prompt,
                execution.plan,
                execution.reasoning,
                actions,
                code_changes,
                execution.outcome,
                execution.success,
                duration_ms,
                execution.model,
                execution.tokens,
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO execution_metrics (execution_id, key, value, value_type, unit, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for metric in &metrics {
                stmt.execute(params![
                    id,
                    metric.key,
                    metric.value.encode(),
                    metric.value.kind(),
                    metric.unit,
                    ts(&timestamp),
                ])?;
            }
        }

        tx.commit()?;

        tracing::info!(
            execution_id = id,
            success = execution.success,
            metrics = metrics.len(),
            "Recorded execution"
        );
        Ok(id)
    }

    /// Get an execution by id
    pub fn get_execution(&self, id: i64) -> Result<Option<ExecutionRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM executions WHERE id = ?",
            [id],
            Self::row_to_execution,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_execution(row: &Row) -> rusqlite::Result<ExecutionRecord> {
        let id: i64 = row.get("id")?;
        let timestamp_str: String = row.get("timestamp")?;
        let actions_str: String = row.get("actions")?;
        let code_changes_str: Option<String> = row.get("code_changes")?;
        let duration_ms: i64 = row.get("duration_ms")?;

        let actions = serde_json::from_str(&actions_str).unwrap_or_else(|e| {
            tracing::warn!(execution_id = id, error = %e, "Malformed actions payload");
            Vec::new()
        });
        let code_changes = code_changes_str.and_then(|s| match serde_json::from_str(&s) {
            Ok(changes) => Some(changes),
            Err(e) => {
                tracing::warn!(execution_id = id, error = %e, "Malformed code_changes payload");
                None
            }
        });

        Ok(ExecutionRecord {
            id,
            timestamp: parse_ts(&timestamp_str),
            prompt: row.get("prompt")?,
            plan: row.get("plan")?,
            reasoning: row.get("reasoning")?,
            actions,
            code_changes,
            outcome: row.get("outcome")?,
            success: row.get("success")?,
            duration_ms: duration_ms.max(0) as u64,
            model: row.get("model")?,
            tokens: row.get("tokens")?,
        })
    }

    /// Delete executions older than `cutoff`, cascading to their metrics
    /// and full-text index rows. Returns the number of executions deleted.
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM executions WHERE timestamp < ?1",
            [ts(&cutoff)],
        )?;
        tracing::info!(deleted, cutoff = %cutoff, "Deleted old executions");
        Ok(deleted)
    }

    /// Count executions
    pub fn count_executions(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM executions", [], |r| r.get(0))?;
        Ok(count)
    }

    // ============================================
    // Metric operations
    // ============================================

    /// Metrics for an execution, optionally filtered by key, in insertion order.
    ///
    /// Entries whose value cannot be decoded are logged and left out.
    pub fn query_metrics(&self, execution_id: i64, key: Option<&str>) -> Result<Vec<MetricEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, execution_id, key, value, value_type, unit, timestamp
            FROM execution_metrics
            WHERE execution_id = ?1 AND (?2 IS NULL OR key = ?2)
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![execution_id, key], Self::row_to_raw_metric)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().filter_map(RawMetric::decode).collect())
    }

    fn row_to_raw_metric(row: &Row) -> rusqlite::Result<RawMetric> {
        Ok(RawMetric {
            id: row.get(0)?,
            execution_id: row.get(1)?,
            key: row.get(2)?,
            value: row.get(3)?,
            value_type: row.get(4)?,
            unit: row.get(5)?,
            timestamp: row.get(6)?,
        })
    }

    /// Count metric entries whose execution no longer exists.
    pub fn count_orphaned_metrics(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            r#"
            SELECT COUNT(*) FROM execution_metrics
            WHERE execution_id NOT IN (SELECT id FROM executions)
            "#,
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Delete metric entries whose execution no longer exists.
    pub fn repair_orphaned_metrics(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM execution_metrics WHERE execution_id NOT IN (SELECT id FROM executions)",
            [],
        )?;
        if removed > 0 {
            tracing::warn!(removed, "Removed orphaned metric entries");
        }
        Ok(removed)
    }

    // ============================================
    // Statistics
    // ============================================

    /// Store-wide totals
    pub fn get_overview(&self) -> Result<Overview> {
        let database_size_bytes = self.get_database_size()?;
        let conn = self.conn.lock().unwrap();

        let (total, successful, avg_duration, oldest, newest): (
            i64,
            i64,
            Option<f64>,
            Option<String>,
            Option<String>,
        ) = conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(success), 0), AVG(duration_ms),
                   MIN(timestamp), MAX(timestamp)
            FROM executions
            "#,
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )?;
        let total_metric_entries: i64 =
            conn.query_row("SELECT COUNT(*) FROM execution_metrics", [], |r| r.get(0))?;

        let total = total.max(0) as u64;
        let successful = successful.max(0) as u64;
        Ok(Overview {
            total_executions: total,
            successful_executions: successful,
            failed_executions: total - successful.min(total),
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            avg_duration_ms: avg_duration.unwrap_or(0.0),
            oldest_execution: oldest.as_deref().map(parse_ts),
            newest_execution: newest.as_deref().map(parse_ts),
            total_metric_entries: total_metric_entries.max(0) as u64,
            database_size_bytes,
        })
    }

    /// Get the database file size in bytes.
    pub fn get_database_size(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();

        let page_count: u64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: u64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(page_count * page_size)
    }

    /// Load everything the analytics aggregator reads.
    pub fn analytics_snapshot(&self) -> Result<AnalyticsSnapshot> {
        let overview = self.get_overview()?;
        let conn = self.conn.lock().unwrap();

        let executions = {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, timestamp, success, duration_ms, model, tokens
                FROM executions
                ORDER BY id ASC
                "#,
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let timestamp_str: String = row.get(1)?;
                    let duration_ms: i64 = row.get(3)?;
                    Ok(ExecutionDigest {
                        id: row.get(0)?,
                        timestamp: parse_ts(&timestamp_str),
                        success: row.get(2)?,
                        duration_ms: duration_ms.max(0) as u64,
                        model: row.get(4)?,
                        tokens: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let metrics = {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, execution_id, key, value, value_type, unit, timestamp
                FROM execution_metrics
                WHERE key IN (?1, ?2, ?3, ?4)
                ORDER BY id ASC
                "#,
            )?;
            let rows = stmt
                .query_map(params_from_iter(ANALYTICS_KEYS), Self::row_to_raw_metric)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .filter_map(RawMetric::decode)
                .collect::<Vec<_>>()
        };

        Ok(AnalyticsSnapshot {
            overview,
            executions,
            metrics,
        })
    }
}

/// A metric row before its value is decoded.
struct RawMetric {
    id: i64,
    execution_id: i64,
    key: String,
    value: String,
    value_type: String,
    unit: Option<String>,
    timestamp: String,
}

impl RawMetric {
    fn decode(self) -> Option<MetricEntry> {
        match MetricValue::decode(&self.key, &self.value_type, &self.value) {
            Ok(value) => Some(MetricEntry {
                id: self.id,
                execution_id: self.execution_id,
                key: self.key,
                value,
                unit: self.unit,
                timestamp: parse_ts(&self.timestamp),
            }),
            Err(e) => {
                tracing::warn!(
                    metric_id = self.id,
                    execution_id = self.execution_id,
                    error = %e,
                    "Skipping malformed metric"
                );
                None
            }
        }
    }
}

impl TextMatchProvider for Database {
    fn find_matches(&self, query: &str, limit: usize) -> Result<Vec<TextMatch>> {
        let Some(match_query) = build_match_query(query) else {
            return Ok(Vec::new());
        };

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT e.id, bm25(executions_fts) AS score, e.prompt, e.plan, e.reasoning,
                   e.outcome, e.success, e.timestamp
            FROM executions_fts
            JOIN executions e ON e.id = executions_fts.rowid
            WHERE executions_fts MATCH ?1
            ORDER BY score ASC, e.id ASC
            LIMIT ?2
            "#,
        )?;

        let matches = stmt
            .query_map(params![match_query, limit as i64], |row| {
                let bm25: f64 = row.get(1)?;
                let timestamp_str: String = row.get(7)?;
                Ok(TextMatch {
                    id: row.get(0)?,
                    rank: rank_from_bm25(bm25),
                    prompt: row.get(2)?,
                    plan: row.get(3)?,
                    reasoning: row.get(4)?,
                    outcome: row.get(5)?,
                    success: row.get(6)?,
                    timestamp: parse_ts(&timestamp_str),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(matches)
    }
}

impl HistoryStore for Database {
    fn execution_metadata(&self, id: i64) -> Result<ExecutionMetadata> {
        let metrics = self.query_metrics(id, None)?;
        Ok(ExecutionMetadata::from_metrics(&metrics))
    }

    fn recent_outcomes_containing(&self, fragment: &str, limit: usize) -> Result<OutcomeTally> {
        let conn = self.conn.lock().unwrap();
        let (total, successes): (i64, i64) = conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(success), 0)
            FROM (
                SELECT success FROM executions
                WHERE prompt LIKE ?1 ESCAPE '\'
                ORDER BY timestamp DESC, id DESC
                LIMIT ?2
            )
            "#,
            params![like_contains(fragment), limit as i64],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(OutcomeTally {
            total: total.max(0) as u64,
            successes: successes.max(0) as u64,
        })
    }

    fn outcomes_mentioning_any(&self, words: &[String]) -> Result<OutcomeTally> {
        if words.is_empty() {
            return Ok(OutcomeTally::default());
        }

        let clauses: Vec<String> = (1..=words.len())
            .map(|i| format!("prompt LIKE ?{} ESCAPE '\\'", i))
            .collect();
        let sql = format!(
            "SELECT COUNT(*), COALESCE(SUM(success), 0) FROM executions WHERE {}",
            clauses.join(" OR ")
        );

        let conn = self.conn.lock().unwrap();
        let (total, successes): (i64, i64) = conn.query_row(
            &sql,
            params_from_iter(words.iter().map(|w| like_contains(w))),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(OutcomeTally {
            total: total.max(0) as u64,
            successes: successes.max(0) as u64,
        })
    }
}
