//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: execution log and keyed metrics
    r#"
    CREATE TABLE IF NOT EXISTS executions (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp        DATETIME NOT NULL,
        prompt           TEXT NOT NULL CHECK (length(prompt) > 0),
        plan             TEXT,
        reasoning        TEXT,
        actions          JSON NOT NULL DEFAULT '[]',
        code_changes     JSON,
        outcome          TEXT,
        success          INTEGER NOT NULL,
        duration_ms      INTEGER NOT NULL DEFAULT 0 CHECK (duration_ms >= 0),
        model            TEXT,
        tokens           INTEGER
    );

    CREATE TABLE IF NOT EXISTS execution_metrics (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        execution_id     INTEGER NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
        key              TEXT NOT NULL,
        value            TEXT NOT NULL,
        value_type       TEXT NOT NULL DEFAULT 'text',
        unit             TEXT,
        timestamp        DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_executions_timestamp ON executions(timestamp);
    CREATE INDEX IF NOT EXISTS idx_executions_model ON executions(model);
    CREATE INDEX IF NOT EXISTS idx_metrics_execution ON execution_metrics(execution_id, key);
    CREATE INDEX IF NOT EXISTS idx_metrics_key ON execution_metrics(key);
    "#,
    // Version 2: full-text index over executions, kept in sync by triggers
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS executions_fts USING fts5(
        prompt,
        plan,
        reasoning,
        outcome,
        content='executions',
        content_rowid='id',
        tokenize='porter unicode61'
    );

    CREATE TRIGGER IF NOT EXISTS executions_ai AFTER INSERT ON executions BEGIN
        INSERT INTO executions_fts(rowid, prompt, plan, reasoning, outcome)
        VALUES (new.id, new.prompt, new.plan, new.reasoning, new.outcome);
    END;

    CREATE TRIGGER IF NOT EXISTS executions_ad AFTER DELETE ON executions BEGIN
        INSERT INTO executions_fts(executions_fts, rowid, prompt, plan, reasoning, outcome)
        VALUES ('delete', old.id, old.prompt, old.plan, old.reasoning, old.outcome);
    END;

    CREATE TRIGGER IF NOT EXISTS executions_au AFTER UPDATE ON executions BEGIN
        INSERT INTO executions_fts(executions_fts, rowid, prompt, plan, reasoning, outcome)
        VALUES ('delete', old.id, old.prompt, old.plan, old.reasoning, old.outcome);
        INSERT INTO executions_fts(rowid, prompt, plan, reasoning, outcome)
        VALUES (new.id, new.prompt, new.plan, new.reasoning, new.outcome);
    END;

    -- Index rows written before this migration
    INSERT INTO executions_fts(executions_fts) VALUES ('rebuild');
    "#,
];

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// Each migration commits together with its `user_version` bump, so an
/// interrupted upgrade resumes at the first unapplied step.
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let from = get_schema_version(conn)?;
    if from >= SCHEMA_VERSION {
        tracing::debug!(version = from, "Schema up to date");
        return Ok(());
    }

    for (version, migration) in (1..).zip(MIGRATIONS.iter()).skip(from.max(0) as usize) {
        tracing::info!(version, "Applying migration");
        let batch = format!(
            "BEGIN;\n{}\nPRAGMA user_version = {};\nCOMMIT;",
            migration, version
        );
        if let Err(e) = conn.execute_batch(&batch) {
            let _ = conn.execute_batch("ROLLBACK;");
            return Err(e.into());
        }
    }

    tracing::info!(from, to = SCHEMA_VERSION, "Schema migrated");
    Ok(())
}

/// Schema version recorded in the database (0 for a fresh file)
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}
