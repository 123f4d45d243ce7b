//! Analytics over the execution history
//!
//! Provides roll-ups that run independently of search:
//! - Overview totals (counts, success rate, store size)
//! - Trends (daily activity, hour-of-day distribution, growth rates)
//! - Patterns (categories, tags, complexity, model usage)
//! - Performance (durations, memory samples)
//! - Rule-based insights
//!
//! Metric values that fail to decode are dropped at the store boundary, so a
//! malformed record lowers report quality without aborting it.

pub mod aggregator;
pub mod insights;
pub mod report;

pub use aggregator::{
    compute_report, growth_rate, tag_statistics, AnalyticsSnapshot, ExecutionDigest,
};
pub use insights::derive_insights;
pub use report::{
    AnalyticsReport, ComplexityBucket, DailyTrend, Insight, InsightKind, LabelStat, ModelUsage,
    Overview, Patterns, Performance, SampleStats, Trends,
};
