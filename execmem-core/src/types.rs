//! Core domain types for execmem
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Execution** | One completed agent task, the unit of memory |
//! | **Action** | A single tool invocation made while executing a task |
//! | **Metric entry** | A typed key/value attribute attached to an execution |
//! | **Candidate** | An execution returned by full-text search for a query |
//!
//! Executions are append-only: they are written once and only removed by
//! retention cleanup, which cascades to their metric entries.

use crate::error::{Error, Result};
use crate::scoring::defaults;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known metric keys.
pub mod keys {
    pub const TAGS: &str = "tags";
    pub const CATEGORY: &str = "category";
    pub const PRIORITY: &str = "priority";
    pub const COMPLEXITY: &str = "complexity";
    pub const CONFIDENCE: &str = "confidence";
    pub const MEMORY_USAGE: &str = "memory_usage";
}

// ============================================
// Actions
// ============================================

/// Status of a single tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Success,
    Error,
    Cancelled,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Success => "success",
            ActionStatus::Error => "error",
            ActionStatus::Cancelled => "cancelled",
        }
    }
}

/// One tool invocation within an execution.
///
/// Actions are owned by their execution and stored inline as a JSON list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Kind of action (e.g. "tool", "shell")
    #[serde(rename = "type")]
    pub action_type: String,
    /// Command or tool name
    pub command: String,
    /// Invocation parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub duration_ms: u64,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Code changes produced by an execution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodeChanges {
    /// Files touched, in the order they were changed
    #[serde(default)]
    pub files: Vec<String>,
    /// Unified diff text
    #[serde(default)]
    pub diff: String,
}

// ============================================
// Executions
// ============================================

/// A stored execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Store-assigned id, increasing with insertion order
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub plan: Option<String>,
    pub reasoning: Option<String>,
    pub actions: Vec<ActionRecord>,
    pub code_changes: Option<CodeChanges>,
    pub outcome: Option<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub model: Option<String>,
    pub tokens: Option<i64>,
}

/// An execution to be recorded.
///
/// This is the JSON document accepted by `execmem log`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewExecution {
    /// Defaults to the time of insertion
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub prompt: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
    #[serde(default)]
    pub code_changes: Option<CodeChanges>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tokens: Option<i64>,
    /// Structured metadata, stored as well-known metric entries
    #[serde(default)]
    pub annotations: Annotations,
    /// Free-form metrics (environment facts, performance samples)
    #[serde(default)]
    pub metrics: Vec<NewMetric>,
}

impl NewExecution {
    /// Convenience constructor used by callers and tests.
    pub fn new(prompt: impl Into<String>, success: bool) -> Self {
        Self {
            prompt: prompt.into(),
            success,
            ..Default::default()
        }
    }

    /// Check the record can be stored.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::InvalidRecord("prompt must not be empty".to_string()));
        }
        if i64::try_from(self.duration_ms).is_err() {
            return Err(Error::InvalidRecord(format!(
                "duration_ms {} exceeds {}",
                self.duration_ms,
                i64::MAX
            )));
        }
        if let Some(tokens) = self.tokens.filter(|t| *t < 0) {
            return Err(Error::InvalidRecord(format!(
                "tokens must not be negative (got {})",
                tokens
            )));
        }
        Ok(())
    }

    /// All metric entries to write for this execution: annotations first,
    /// then the free-form metrics in caller order.
    pub fn metric_entries(&self) -> Vec<NewMetric> {
        let mut entries = self.annotations.to_metrics();
        entries.extend(self.metrics.iter().cloned());
        entries
    }
}

/// Structured metadata callers attach to an execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Clamped to 1..=10 before storage
    #[serde(default)]
    pub complexity: Option<f64>,
    /// Clamped to 0..=1 before storage
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Annotations {
    fn to_metrics(&self) -> Vec<NewMetric> {
        let mut out = Vec::new();
        if !self.tags.is_empty() {
            out.push(NewMetric::new(
                keys::TAGS,
                MetricValue::Json(serde_json::json!(self.tags)),
            ));
        }
        if let Some(category) = &self.category {
            out.push(NewMetric::new(
                keys::CATEGORY,
                MetricValue::Text(category.clone()),
            ));
        }
        if let Some(priority) = &self.priority {
            out.push(NewMetric::new(
                keys::PRIORITY,
                MetricValue::Text(priority.clone()),
            ));
        }
        if let Some(complexity) = self.complexity.filter(|c| c.is_finite()) {
            out.push(NewMetric::new(
                keys::COMPLEXITY,
                MetricValue::Integer(clamp_complexity(complexity) as i64),
            ));
        }
        if let Some(confidence) = self.confidence.filter(|c| c.is_finite()) {
            out.push(NewMetric::new(
                keys::CONFIDENCE,
                MetricValue::Real(confidence.clamp(0.0, 1.0)),
            ));
        }
        out
    }
}

/// Round and clamp a complexity rating into 1..=10.
pub fn clamp_complexity(value: f64) -> u8 {
    value.round().clamp(1.0, 10.0) as u8
}

// ============================================
// Metrics
// ============================================

/// A decoded metric value.
///
/// Values are stored as `(value, value_type)` text pairs and decoded once
/// when read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum MetricValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Json(serde_json::Value),
}

impl MetricValue {
    /// Storage tag written to `execution_metrics.value_type`
    pub fn kind(&self) -> &'static str {
        match self {
            MetricValue::Text(_) => "text",
            MetricValue::Integer(_) => "integer",
            MetricValue::Real(_) => "real",
            MetricValue::Json(_) => "json",
        }
    }

    /// Encode for storage
    pub fn encode(&self) -> String {
        match self {
            MetricValue::Text(s) => s.clone(),
            MetricValue::Integer(i) => i.to_string(),
            MetricValue::Real(f) => f.to_string(),
            MetricValue::Json(v) => v.to_string(),
        }
    }

    /// Decode a stored `(value_type, value)` pair.
    ///
    /// Unknown type tags are read as text so legacy rows stay visible.
    pub fn decode(key: &str, kind: &str, raw: &str) -> Result<Self> {
        let malformed = |message: String| Error::MalformedMetric {
            key: key.to_string(),
            message,
        };
        match kind {
            "integer" => raw
                .trim()
                .parse::<i64>()
                .map(MetricValue::Integer)
                .map_err(|e| malformed(format!("{}: {:?}", e, raw))),
            "real" | "score" | "percentage" => raw
                .trim()
                .parse::<f64>()
                .map(MetricValue::Real)
                .map_err(|e| malformed(format!("{}: {:?}", e, raw))),
            "json" => serde_json::from_str(raw)
                .map(MetricValue::Json)
                .map_err(|e| malformed(e.to_string())),
            _ => Ok(MetricValue::Text(raw.to_string())),
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Integer(i) => Some(*i as f64),
            MetricValue::Real(f) => Some(*f),
            MetricValue::Text(s) => s.trim().parse().ok(),
            MetricValue::Json(v) => v.as_f64(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            MetricValue::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// String list view (tags are stored as a JSON array of strings).
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            MetricValue::Json(serde_json::Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for MetricValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => MetricValue::Text(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => MetricValue::Integer(i),
                None => MetricValue::Real(n.as_f64().unwrap_or(0.0)),
            },
            other => MetricValue::Json(other),
        }
    }
}

impl From<MetricValue> for serde_json::Value {
    fn from(value: MetricValue) -> Self {
        match value {
            MetricValue::Text(s) => serde_json::Value::String(s),
            MetricValue::Integer(i) => i.into(),
            MetricValue::Real(f) => f.into(),
            MetricValue::Json(v) => v,
        }
    }
}

/// A metric to be written alongside a new execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMetric {
    pub key: String,
    pub value: MetricValue,
    #[serde(default)]
    pub unit: Option<String>,
}

impl NewMetric {
    pub fn new(key: impl Into<String>, value: MetricValue) -> Self {
        Self {
            key: key.into(),
            value,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// A stored metric entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub id: i64,
    pub execution_id: i64,
    pub key: String,
    pub value: MetricValue,
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Structured metadata for an execution, resolved from its metric entries.
///
/// Singleton keys take the most recently written entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub tags: Vec<String>,
    pub category: String,
    pub priority: String,
    pub complexity: u8,
    pub confidence: f64,
}

impl Default for ExecutionMetadata {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            category: defaults::CATEGORY.to_string(),
            priority: defaults::PRIORITY.to_string(),
            complexity: defaults::COMPLEXITY,
            confidence: defaults::CONFIDENCE,
        }
    }
}

impl ExecutionMetadata {
    /// Resolve metadata from entries, clamping out-of-range legacy values.
    pub fn from_metrics(entries: &[MetricEntry]) -> Self {
        let mut meta = Self::default();
        let mut tags: Vec<String> = Vec::new();

        for entry in entries {
            match entry.key.as_str() {
                keys::TAGS => {
                    if let Some(list) = entry.value.as_string_list() {
                        for tag in list {
                            if !tags.contains(&tag) {
                                tags.push(tag);
                            }
                        }
                    }
                }
                keys::CATEGORY => {
                    if let Some(category) = entry.value.as_text() {
                        meta.category = category.to_string();
                    }
                }
                keys::PRIORITY => {
                    if let Some(priority) = entry.value.as_text() {
                        meta.priority = priority.to_string();
                    }
                }
                keys::COMPLEXITY => {
                    if let Some(c) = entry.value.as_f64().filter(|c| c.is_finite()) {
                        meta.complexity = clamp_complexity(c);
                    }
                }
                keys::CONFIDENCE => {
                    if let Some(c) = entry.value.as_f64().filter(|c| c.is_finite()) {
                        meta.confidence = c.clamp(0.0, 1.0);
                    }
                }
                _ => {}
            }
        }

        meta.tags = tags;
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: MetricValue) -> MetricEntry {
        MetricEntry {
            id: 0,
            execution_id: 1,
            key: key.to_string(),
            value,
            unit: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_decode_metric_values() {
        assert_eq!(
            MetricValue::decode("complexity", "integer", "7").unwrap(),
            MetricValue::Integer(7)
        );
        assert_eq!(
            MetricValue::decode("confidence", "score", "0.25").unwrap(),
            MetricValue::Real(0.25)
        );
        assert_eq!(
            MetricValue::decode("category", "legacy", "bugfix").unwrap(),
            MetricValue::Text("bugfix".to_string())
        );
        assert!(matches!(
            MetricValue::decode("tags", "json", "[\"a\", "),
            Err(Error::MalformedMetric { .. })
        ));
    }

    #[test]
    fn test_metric_value_from_json() {
        assert_eq!(
            MetricValue::from(serde_json::json!("x")),
            MetricValue::Text("x".to_string())
        );
        assert_eq!(MetricValue::from(serde_json::json!(3)), MetricValue::Integer(3));
        assert_eq!(MetricValue::from(serde_json::json!(1.5)), MetricValue::Real(1.5));
        assert_eq!(
            MetricValue::from(serde_json::json!(["a"])),
            MetricValue::Json(serde_json::json!(["a"]))
        );
    }

    #[test]
    fn test_metadata_defaults() {
        let meta = ExecutionMetadata::from_metrics(&[]);
        assert!(meta.tags.is_empty());
        assert_eq!(meta.category, "general");
        assert_eq!(meta.priority, "medium");
        assert_eq!(meta.complexity, 5);
        assert_eq!(meta.confidence, 0.5);
    }

    #[test]
    fn test_metadata_clamps_legacy_values() {
        let meta = ExecutionMetadata::from_metrics(&[
            entry(keys::COMPLEXITY, MetricValue::Integer(42)),
            entry(keys::CONFIDENCE, MetricValue::Real(-0.3)),
            entry(keys::TAGS, MetricValue::Json(serde_json::json!(["a", "b", "a"]))),
        ]);
        assert_eq!(meta.complexity, 10);
        assert_eq!(meta.confidence, 0.0);
        assert_eq!(meta.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_annotations_are_clamped() {
        let mut exec = NewExecution::new("do it", true);
        exec.annotations.complexity = Some(0.2);
        exec.annotations.confidence = Some(1.7);
        let metrics = exec.metric_entries();

        let complexity = metrics.iter().find(|m| m.key == keys::COMPLEXITY).unwrap();
        assert_eq!(complexity.value, MetricValue::Integer(1));
        let confidence = metrics.iter().find(|m| m.key == keys::CONFIDENCE).unwrap();
        assert_eq!(confidence.value, MetricValue::Real(1.0));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        assert!(NewExecution::new("   ", true).validate().is_err());
        assert!(NewExecution::new("fix it", true).validate().is_ok());
    }

    #[test]
    fn test_out_of_range_counts_rejected() {
        let mut execution = NewExecution::new("long run", true);
        execution.duration_ms = u64::MAX - 5;
        assert!(matches!(execution.validate(), Err(Error::InvalidRecord(_))));

        execution.duration_ms = i64::MAX as u64;
        assert!(execution.validate().is_ok());

        execution.tokens = Some(-1);
        assert!(matches!(execution.validate(), Err(Error::InvalidRecord(_))));

        execution.tokens = Some(0);
        assert!(execution.validate().is_ok());
    }

    #[test]
    fn test_new_execution_from_json() {
        let json = r#"{
            "prompt": "Fix null pointer in parser",
            "success": true,
            "duration_ms": 1200,
            "actions": [{
                "type": "tool",
                "command": "edit",
                "parameters": {"path": "src/parser.rs"},
                "timestamp": "2025-01-01T00:00:00Z",
                "status": "success"
            }],
            "annotations": {"tags": ["parser", "bug"], "complexity": 6},
            "metrics": [{"key": "memory_usage", "value": 128.5, "unit": "MB"}]
        }"#;
        let exec: NewExecution = serde_json::from_str(json).unwrap();
        assert_eq!(exec.actions.len(), 1);
        assert_eq!(exec.actions[0].status, ActionStatus::Success);
        assert_eq!(exec.metrics[0].value, MetricValue::Real(128.5));
        assert_eq!(exec.metric_entries().len(), 3);
    }
}
