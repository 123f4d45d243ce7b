//! Aggregation over the full execution history.
//!
//! The store hands over an [`AnalyticsSnapshot`]; everything below is a pure
//! function of that snapshot and the reference time, so reports can be
//! computed and tested without a database.

use super::insights::derive_insights;
use super::report::{
    AnalyticsReport, ComplexityBucket, DailyTrend, LabelStat, ModelUsage, Overview, Patterns,
    Performance, SampleStats, Trends,
};
use crate::types::{clamp_complexity, keys, MetricEntry};
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

const TREND_DAYS: i64 = 30;
const TOP_LABELS: usize = 10;
const UNKNOWN_MODEL: &str = "unknown";

/// The per-execution columns analytics needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionDigest {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: u64,
    pub model: Option<String>,
    pub tokens: Option<i64>,
}

/// Everything the aggregator reads from the store.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsSnapshot {
    pub overview: Overview,
    pub executions: Vec<ExecutionDigest>,
    /// Decoded entries for the keys analytics uses, in insertion order
    pub metrics: Vec<MetricEntry>,
}

/// Build the full report.
pub fn compute_report(snapshot: &AnalyticsSnapshot, now: DateTime<Utc>) -> AnalyticsReport {
    let trends = compute_trends(&snapshot.executions, now);
    let patterns = compute_patterns(&snapshot.executions, &snapshot.metrics);
    let performance = compute_performance(&snapshot.overview, &snapshot.metrics);
    let insights = derive_insights(&snapshot.overview, &trends, &patterns);

    AnalyticsReport {
        generated_at: now,
        overview: snapshot.overview.clone(),
        trends,
        patterns,
        performance,
        insights,
    }
}

/// Percentage change between two windows.
///
/// An empty prior window counts as 100% growth when anything happened
/// since, and 0% otherwise.
pub fn growth_rate(recent: u64, prior: u64) -> f64 {
    if prior == 0 {
        return if recent > 0 { 100.0 } else { 0.0 };
    }
    (recent as f64 - prior as f64) / prior as f64 * 100.0
}

fn rate(successes: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        successes as f64 / total as f64
    }
}

pub fn compute_trends(executions: &[ExecutionDigest], now: DateTime<Utc>) -> Trends {
    let today = now.date_naive();
    let first_day = today - Duration::days(TREND_DAYS - 1);

    let mut per_day: BTreeMap<NaiveDate, (u64, u64)> = (0..TREND_DAYS)
        .map(|offset| (first_day + Duration::days(offset), (0, 0)))
        .collect();
    let mut hourly = [0u64; 24];

    let count_between = |from: DateTime<Utc>, to: DateTime<Utc>| -> u64 {
        executions
            .iter()
            .filter(|e| e.timestamp > from && e.timestamp <= to)
            .count() as u64
    };

    for execution in executions {
        hourly[execution.timestamp.hour() as usize] += 1;
        if let Some((count, successes)) = per_day.get_mut(&execution.timestamp.date_naive()) {
            *count += 1;
            if execution.success {
                *successes += 1;
            }
        }
    }

    let week = Duration::days(7);
    let month = Duration::days(TREND_DAYS);
    let weekly_growth = growth_rate(
        count_between(now - week, now),
        count_between(now - week - week, now - week),
    );
    let monthly_growth = growth_rate(
        count_between(now - month, now),
        count_between(now - month - month, now - month),
    );

    Trends {
        daily: per_day
            .into_iter()
            .map(|(date, (executions, successes))| DailyTrend {
                date,
                executions,
                successes,
                success_rate: rate(successes, executions),
            })
            .collect(),
        hourly,
        weekly_growth,
        monthly_growth,
    }
}

#[derive(Default)]
struct Tally {
    count: u64,
    successes: u64,
}

impl Tally {
    fn add(&mut self, success: bool) {
        self.count += 1;
        if success {
            self.successes += 1;
        }
    }
}

fn top_labels(tallies: HashMap<String, Tally>) -> Vec<LabelStat> {
    let mut stats: Vec<LabelStat> = tallies
        .into_iter()
        .map(|(name, tally)| LabelStat {
            name,
            count: tally.count,
            success_rate: rate(tally.successes, tally.count),
        })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    stats.truncate(TOP_LABELS);
    stats
}

/// Tag frequency and success rate across all executions.
///
/// A tag counts once per execution. Entries whose value is not a list of
/// strings are skipped.
pub fn tag_statistics(executions: &[ExecutionDigest], metrics: &[MetricEntry]) -> Vec<LabelStat> {
    let outcomes: HashMap<i64, bool> = executions.iter().map(|e| (e.id, e.success)).collect();

    let mut tags_by_execution: HashMap<i64, HashSet<String>> = HashMap::new();
    for entry in metrics.iter().filter(|m| m.key == keys::TAGS) {
        match entry.value.as_string_list() {
            Some(tags) => tags_by_execution
                .entry(entry.execution_id)
                .or_default()
                .extend(tags),
            None => tracing::debug!(
                execution_id = entry.execution_id,
                "Skipping tags entry that is not a string list"
            ),
        }
    }

    let mut tallies: HashMap<String, Tally> = HashMap::new();
    for (execution_id, tags) in tags_by_execution {
        let Some(success) = outcomes.get(&execution_id) else {
            continue;
        };
        for tag in tags {
            tallies.entry(tag).or_default().add(*success);
        }
    }

    top_labels(tallies)
}

pub fn compute_patterns(executions: &[ExecutionDigest], metrics: &[MetricEntry]) -> Patterns {
    let by_id: HashMap<i64, &ExecutionDigest> = executions.iter().map(|e| (e.id, e)).collect();

    // Singleton keys: the latest entry per execution wins
    let mut category_of: HashMap<i64, String> = HashMap::new();
    let mut complexity_of: HashMap<i64, u8> = HashMap::new();
    for entry in metrics {
        match entry.key.as_str() {
            keys::CATEGORY => {
                if let Some(category) = entry.value.as_text() {
                    category_of.insert(entry.execution_id, category.to_string());
                }
            }
            keys::COMPLEXITY => {
                if let Some(c) = entry.value.as_f64().filter(|c| c.is_finite()) {
                    complexity_of.insert(entry.execution_id, clamp_complexity(c));
                }
            }
            _ => {}
        }
    }

    let mut category_tallies: HashMap<String, Tally> = HashMap::new();
    for (execution_id, category) in category_of {
        if let Some(execution) = by_id.get(&execution_id) {
            category_tallies
                .entry(category)
                .or_default()
                .add(execution.success);
        }
    }

    let mut buckets: BTreeMap<u8, (u64, f64)> = BTreeMap::new();
    for (execution_id, complexity) in complexity_of {
        if let Some(execution) = by_id.get(&execution_id) {
            let (count, total_duration) = buckets.entry(complexity).or_default();
            *count += 1;
            *total_duration += execution.duration_ms as f64;
        }
    }

    // Sums are kept as f64 so extreme token counts cannot overflow
    let mut model_tallies: HashMap<String, (Tally, f64, u64)> = HashMap::new();
    for execution in executions {
        let model = execution
            .model
            .clone()
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
        let (tally, token_sum, token_samples) = model_tallies.entry(model).or_default();
        tally.add(execution.success);
        if let Some(tokens) = execution.tokens {
            *token_sum += tokens as f64;
            *token_samples += 1;
        }
    }
    let mut models: Vec<ModelUsage> = model_tallies
        .into_iter()
        .map(|(model, (tally, token_sum, token_samples))| ModelUsage {
            model,
            count: tally.count,
            avg_tokens: (token_samples > 0).then(|| token_sum / token_samples as f64),
            success_rate: rate(tally.successes, tally.count),
        })
        .collect();
    models.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.model.cmp(&b.model)));

    Patterns {
        categories: top_labels(category_tallies),
        tags: tag_statistics(executions, metrics),
        complexity: buckets
            .into_iter()
            .map(|(complexity, (count, total_duration))| ComplexityBucket {
                complexity,
                count,
                avg_duration_ms: total_duration / count as f64,
            })
            .collect(),
        models,
    }
}

pub fn compute_performance(overview: &Overview, metrics: &[MetricEntry]) -> Performance {
    let samples: Vec<f64> = metrics
        .iter()
        .filter(|m| m.key == keys::MEMORY_USAGE)
        .filter_map(|m| m.value.as_f64())
        .filter(|v| v.is_finite())
        .collect();

    let memory_usage = if samples.is_empty() {
        None
    } else {
        Some(SampleStats {
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            avg: samples.iter().sum::<f64>() / samples.len() as f64,
            samples: samples.len() as u64,
        })
    };

    Performance {
        avg_duration_ms: overview.avg_duration_ms,
        memory_usage,
    }
}
