//! Analytics report types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Full analytics report over the execution history.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub overview: Overview,
    pub trends: Trends,
    pub patterns: Patterns,
    pub performance: Performance,
    pub insights: Vec<Insight>,
}

/// Store-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    /// successful / total, 0 for an empty store
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub oldest_execution: Option<DateTime<Utc>>,
    pub newest_execution: Option<DateTime<Utc>>,
    pub total_metric_entries: u64,
    pub database_size_bytes: u64,
}

impl Overview {
    pub fn metrics_per_execution(&self) -> f64 {
        if self.total_executions == 0 {
            0.0
        } else {
            self.total_metric_entries as f64 / self.total_executions as f64
        }
    }
}

/// Activity for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub executions: u64,
    pub successes: u64,
    pub success_rate: f64,
}

/// Activity over time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trends {
    /// Last 30 days, oldest first; days without activity are included
    pub daily: Vec<DailyTrend>,
    /// Executions by hour of day (UTC), index 0 = midnight
    pub hourly: [u64; 24],
    /// Last 7 days vs. the 7 before, in percent
    pub weekly_growth: f64,
    /// Last 30 days vs. the 30 before, in percent
    pub monthly_growth: f64,
}

/// Frequency and success rate of a category, tag, or similar label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelStat {
    pub name: String,
    pub count: u64,
    pub success_rate: f64,
}

/// Executions at one complexity level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexityBucket {
    pub complexity: u8,
    pub count: u64,
    pub avg_duration_ms: f64,
}

/// Usage of one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUsage {
    pub model: String,
    pub count: u64,
    /// Average over executions that reported a token count
    pub avg_tokens: Option<f64>,
    pub success_rate: f64,
}

/// What the history is made of.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Patterns {
    /// Top 10 categories by frequency
    pub categories: Vec<LabelStat>,
    /// Top 10 tags by frequency
    pub tags: Vec<LabelStat>,
    /// One bucket per complexity level present, ascending
    pub complexity: Vec<ComplexityBucket>,
    /// Most used model first
    pub models: Vec<ModelUsage>,
}

/// Summary of numeric samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub samples: u64,
}

/// Runtime characteristics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Performance {
    pub avg_duration_ms: f64,
    /// Over all `memory_usage` metric entries, if any
    pub memory_usage: Option<SampleStats>,
}

/// Kind of rule-based insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Recommendation,
    Anomaly,
    Optimization,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Recommendation => "recommendation",
            InsightKind::Anomaly => "anomaly",
            InsightKind::Optimization => "optimization",
        }
    }
}

/// A rule-based observation about the history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

impl Insight {
    pub fn new(kind: InsightKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
