//! Text rendering for CLI output.

use chrono::{DateTime, Utc};
use execmem_core::analytics::{AnalyticsReport, Overview};
use execmem_core::{ExecutionDetails, MetricValue, ScoredResult, TextMatch, Weights};

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

fn status(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "failed"
    }
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Human-readable byte count
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn format_metric_value(value: &MetricValue) -> String {
    match value {
        MetricValue::Text(s) => s.clone(),
        MetricValue::Integer(i) => i.to_string(),
        MetricValue::Real(f) => format!("{:.2}", f),
        MetricValue::Json(v) => v.to_string(),
    }
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn execution_details(details: &ExecutionDetails) -> String {
    let execution = &details.execution;
    let mut lines = vec![
        format!("Execution {}", execution.id),
        format!("  When:     {}", timestamp(&execution.timestamp)),
        format!("  Status:   {}", status(execution.success)),
        format!("  Duration: {}ms", execution.duration_ms),
    ];
    if let Some(model) = &execution.model {
        lines.push(format!("  Model:    {}", model));
    }
    if let Some(tokens) = execution.tokens {
        lines.push(format!("  Tokens:   {}", tokens));
    }
    lines.push(format!("  Prompt:   {}", execution.prompt));

    for (label, text) in [
        ("Plan", &execution.plan),
        ("Reasoning", &execution.reasoning),
        ("Outcome", &execution.outcome),
    ] {
        if let Some(text) = text {
            lines.push(format!("  {}: {}", label, text));
        }
    }

    if !execution.actions.is_empty() {
        lines.push(format!("  Actions ({}):", execution.actions.len()));
        for action in &execution.actions {
            lines.push(format!(
                "    [{}] {} {} ({}ms)",
                action.status.as_str(),
                action.action_type,
                action.command,
                action.duration_ms
            ));
        }
    }

    if let Some(changes) = &execution.code_changes {
        lines.push(format!("  Files changed: {}", changes.files.join(", ")));
    }

    if !details.metrics.is_empty() {
        lines.push("  Metrics:".to_string());
        for metric in &details.metrics {
            let unit = metric
                .unit
                .as_deref()
                .map(|u| format!(" {}", u))
                .unwrap_or_default();
            lines.push(format!(
                "    {}: {}{}",
                metric.key,
                format_metric_value(&metric.value),
                unit
            ));
        }
    }

    finish(lines)
}

pub fn text_matches(matches: &[TextMatch]) -> String {
    if matches.is_empty() {
        return "No matching executions.\n".to_string();
    }
    let lines = matches
        .iter()
        .map(|m| {
            format!(
                "#{:<5} {:>7.3}  {}  [{}] {}",
                m.id,
                m.rank,
                timestamp(&m.timestamp),
                status(m.success),
                m.prompt
            )
        })
        .collect();
    finish(lines)
}

pub fn scored_results(results: &[ScoredResult]) -> String {
    if results.is_empty() {
        return "No matching executions.\n".to_string();
    }
    let mut lines = Vec::new();
    for result in results {
        lines.push(format!(
            "#{:<5} {:.3}  {}  [{}] {}",
            result.id,
            result.relevance_score,
            timestamp(&result.timestamp),
            result.context_type.as_str(),
            result.summary
        ));
        lines.push(format!("       {}", result.matched_content));
        if !result.metadata.tags.is_empty() {
            lines.push(format!(
                "       tags: {}  category: {}",
                result.metadata.tags.join(", "),
                result.metadata.category
            ));
        }
    }
    finish(lines)
}

pub fn overview(overview: &Overview) -> String {
    let range = match (&overview.oldest_execution, &overview.newest_execution) {
        (Some(oldest), Some(newest)) => format!("{} .. {}", timestamp(oldest), timestamp(newest)),
        _ => "-".to_string(),
    };
    finish(vec![
        format!("Executions:     {}", overview.total_executions),
        format!(
            "  succeeded:    {} ({})",
            overview.successful_executions,
            percent(overview.success_rate)
        ),
        format!("  failed:       {}", overview.failed_executions),
        format!("Avg duration:   {:.0}ms", overview.avg_duration_ms),
        format!("Time range:     {}", range),
        format!("Metric entries: {}", overview.total_metric_entries),
        format!("Database size:  {}", format_bytes(overview.database_size_bytes)),
    ])
}

pub fn analytics(report: &AnalyticsReport) -> String {
    let mut out = overview(&report.overview);
    let mut lines = Vec::new();

    lines.push(String::new());
    lines.push("Trends".to_string());
    lines.push(format!("  Weekly growth:  {:.1}%", report.trends.weekly_growth));
    lines.push(format!("  Monthly growth: {:.1}%", report.trends.monthly_growth));
    let active_days = report.trends.daily.iter().filter(|d| d.executions > 0);
    for day in active_days {
        lines.push(format!(
            "  {}  {:>4} runs  {}",
            day.date,
            day.executions,
            percent(day.success_rate)
        ));
    }
    if let Some((hour, count)) = report
        .trends
        .hourly
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .max_by_key(|(_, count)| **count)
    {
        lines.push(format!("  Busiest hour:   {:02}:00 UTC ({} runs)", hour, count));
    }

    let patterns = &report.patterns;
    for (title, stats) in [("Categories", &patterns.categories), ("Tags", &patterns.tags)] {
        if stats.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(title.to_string());
        for stat in stats {
            lines.push(format!(
                "  {:<20} {:>5}  {}",
                stat.name,
                stat.count,
                percent(stat.success_rate)
            ));
        }
    }

    if !patterns.complexity.is_empty() {
        lines.push(String::new());
        lines.push("Complexity".to_string());
        for bucket in &patterns.complexity {
            lines.push(format!(
                "  {:>2}  {:>5} runs  avg {:.0}ms",
                bucket.complexity, bucket.count, bucket.avg_duration_ms
            ));
        }
    }

    if !patterns.models.is_empty() {
        lines.push(String::new());
        lines.push("Models".to_string());
        for usage in &patterns.models {
            let tokens = usage
                .avg_tokens
                .map(|t| format!("{:.0} tokens", t))
                .unwrap_or_else(|| "- tokens".to_string());
            lines.push(format!(
                "  {:<20} {:>5}  {}  {}",
                usage.model,
                usage.count,
                tokens,
                percent(usage.success_rate)
            ));
        }
    }

    if let Some(memory) = &report.performance.memory_usage {
        lines.push(String::new());
        lines.push(format!(
            "Memory usage: min {:.1}  max {:.1}  avg {:.1} ({} samples)",
            memory.min, memory.max, memory.avg, memory.samples
        ));
    }

    if !report.insights.is_empty() {
        lines.push(String::new());
        lines.push("Insights".to_string());
        for insight in &report.insights {
            lines.push(format!("  [{}] {}", insight.kind.as_str(), insight.message));
        }
    }

    out.push_str(&finish(lines));
    out
}

pub fn weights(weights: &Weights) -> String {
    let mut lines: Vec<String> = weights
        .iter()
        .map(|(factor, weight)| format!("{:<16} {:.3}", factor.as_str(), weight))
        .collect();
    lines.push(format!("{:<16} {:.3}", "sum", weights.sum()));
    finish(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_weights_lists_every_factor() {
        let text = weights(&Weights::default());
        assert!(text.contains("ftsScore         0.200"));
        assert!(text.contains("semanticScore    0.200"));
        assert!(text.contains("sum              1.000"));
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(text_matches(&[]), "No matching executions.\n");
        assert_eq!(scored_results(&[]), "No matching executions.\n");
    }
}
