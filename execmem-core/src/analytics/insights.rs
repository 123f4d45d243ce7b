//! Rule-based insights derived from a report.

use super::report::{Insight, InsightKind, Overview, Patterns, Trends};

const MIN_HEALTHY_SUCCESS_RATE: f64 = 0.8;
const SLOW_AVG_DURATION_MS: f64 = 5000.0;
const FAST_WEEKLY_GROWTH_PCT: f64 = 50.0;
const MIN_METRICS_PER_EXECUTION: f64 = 0.5;
const HIGH_COMPLEXITY: u8 = 7;
const MAX_HIGH_COMPLEXITY_SHARE: f64 = 0.3;
const LARGE_STORE_BYTES: u64 = 100 * 1024 * 1024;

/// Apply every rule and collect the ones that fire.
pub fn derive_insights(overview: &Overview, trends: &Trends, patterns: &Patterns) -> Vec<Insight> {
    let mut insights = Vec::new();
    let total = overview.total_executions;

    if total > 0 && overview.success_rate < MIN_HEALTHY_SUCCESS_RATE {
        insights.push(Insight::new(
            InsightKind::Recommendation,
            format!(
                "Success rate is {:.1}%; review recent failures for recurring causes",
                overview.success_rate * 100.0
            ),
        ));
    }

    if overview.avg_duration_ms > SLOW_AVG_DURATION_MS {
        insights.push(Insight::new(
            InsightKind::Recommendation,
            format!(
                "Average execution takes {:.0}ms; consider optimizing queries and indexes",
                overview.avg_duration_ms
            ),
        ));
    }

    if trends.weekly_growth > FAST_WEEKLY_GROWTH_PCT {
        insights.push(Insight::new(
            InsightKind::Recommendation,
            format!(
                "Executions grew {:.0}% week over week; consider a retention policy",
                trends.weekly_growth
            ),
        ));
    }

    if total > 0 && overview.metrics_per_execution() < MIN_METRICS_PER_EXECUTION {
        insights.push(Insight::new(
            InsightKind::Anomaly,
            format!(
                "Only {:.2} metric entries per execution; metadata capture may be failing",
                overview.metrics_per_execution()
            ),
        ));
    }

    if total > 0 {
        let high: u64 = patterns
            .complexity
            .iter()
            .filter(|bucket| bucket.complexity > HIGH_COMPLEXITY)
            .map(|bucket| bucket.count)
            .sum();
        let share = high as f64 / total as f64;
        if share > MAX_HIGH_COMPLEXITY_SHARE {
            insights.push(Insight::new(
                InsightKind::Optimization,
                format!(
                    "{:.0}% of executions are high complexity; consider breaking tasks down",
                    share * 100.0
                ),
            ));
        }
    }

    if overview.database_size_bytes > LARGE_STORE_BYTES {
        insights.push(Insight::new(
            InsightKind::Optimization,
            format!(
                "Store is {:.1}MB; consider cleanup or vacuuming",
                overview.database_size_bytes as f64 / (1024.0 * 1024.0)
            ),
        ));
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::report::ComplexityBucket;

    fn healthy_overview() -> Overview {
        Overview {
            total_executions: 10,
            successful_executions: 9,
            failed_executions: 1,
            success_rate: 0.9,
            avg_duration_ms: 1200.0,
            total_metric_entries: 30,
            database_size_bytes: 4096,
            ..Default::default()
        }
    }

    fn kinds(insights: &[Insight]) -> Vec<InsightKind> {
        insights.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_healthy_history_has_no_insights() {
        let insights =
            derive_insights(&healthy_overview(), &Trends::default(), &Patterns::default());
        assert!(insights.is_empty(), "unexpected insights: {:?}", insights);
    }

    #[test]
    fn test_empty_history_has_no_insights() {
        let insights =
            derive_insights(&Overview::default(), &Trends::default(), &Patterns::default());
        assert!(insights.is_empty());
    }

    #[test]
    fn test_each_rule_fires() {
        let overview = Overview {
            success_rate: 0.5,
            avg_duration_ms: 9000.0,
            total_metric_entries: 2,
            database_size_bytes: 200 * 1024 * 1024,
            ..healthy_overview()
        };
        let trends = Trends {
            weekly_growth: 120.0,
            ..Default::default()
        };
        let patterns = Patterns {
            complexity: vec![ComplexityBucket {
                complexity: 9,
                count: 4,
                avg_duration_ms: 100.0,
            }],
            ..Default::default()
        };

        let insights = derive_insights(&overview, &trends, &patterns);
        assert_eq!(
            kinds(&insights),
            vec![
                InsightKind::Recommendation,
                InsightKind::Recommendation,
                InsightKind::Recommendation,
                InsightKind::Anomaly,
                InsightKind::Optimization,
                InsightKind::Optimization,
            ]
        );
    }

    #[test]
    fn test_complexity_share_threshold_is_strict() {
        let patterns = Patterns {
            complexity: vec![ComplexityBucket {
                complexity: 8,
                count: 3,
                avg_duration_ms: 0.0,
            }],
            ..Default::default()
        };
        // 3 of 10 is exactly 30%, not above it
        let insights = derive_insights(&healthy_overview(), &Trends::default(), &patterns);
        assert!(insights.is_empty());
    }
}
