//! execmem - execution memory for AI coding agents
//!
//! Records completed task executions and recalls the most relevant past ones
//! for a new query.

mod output;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use execmem_core::{Config, ExecutionMemory, Factor, NewExecution, WeightUpdate};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "execmem")]
#[command(about = "Log agent task executions and recall the relevant ones")]
#[command(version)]
struct Args {
    /// Database file (defaults to the configured or XDG location)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Record an execution from a JSON document
    Log {
        /// Read the document from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show one execution with its metrics
    Show {
        /// Execution id
        id: i64,
    },

    /// Search past executions
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Re-rank matches with the relevance scorer
        #[arg(short, long)]
        advanced: bool,

        /// Override one weight for this search, e.g. ftsScore=0.4
        #[arg(short, long = "weight", value_name = "NAME=VALUE", value_parser = parse_weight, requires = "advanced")]
        weights: Vec<(Factor, f64)>,
    },

    /// Store-wide totals
    Stats,

    /// Trends, patterns, performance, and insights
    Analytics,

    /// Show the effective relevance weights
    Weights,

    /// Delete old executions
    Cleanup {
        /// Retention window (defaults to storage.retention_days)
        #[arg(long)]
        older_than_days: Option<u32>,
    },

    /// Remove metric entries whose execution no longer exists
    Repair,
}

/// Parse a `NAME=VALUE` weight override
fn parse_weight(s: &str) -> std::result::Result<(Factor, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let factor = name.trim().parse::<Factor>().map_err(|e| e.to_string())?;
    let weight = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight '{}': {}", value, e))?;
    Ok((factor, weight))
}

#[derive(Serialize)]
struct Recorded {
    id: i64,
}

#[derive(Serialize)]
struct Cleaned {
    retention_days: u32,
    deleted: usize,
}

#[derive(Serialize)]
struct Repaired {
    orphaned: i64,
    removed: usize,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(path) = args.database.clone() {
        config.storage.database_path = Some(path);
    }

    // Initialize logging
    let _log_guard =
        execmem_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = config.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let memory = ExecutionMemory::open(&config).context("failed to open execution store")?;

    run(&args, &config, &memory)
}

fn run(args: &Args, config: &Config, memory: &ExecutionMemory) -> Result<()> {
    let format = args.format;

    match &args.command {
        Command::Log { file } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("failed to read stdin")?;
                    buf
                }
            };
            let execution: NewExecution =
                serde_json::from_str(&raw).context("invalid execution document")?;
            let id = memory
                .record_execution(&execution)
                .context("failed to record execution")?;

            match format {
                OutputFormat::Json => print_json(&Recorded { id })?,
                OutputFormat::Text => println!("Recorded execution {}", id),
            }
        }

        Command::Show { id } => {
            let details = memory.get_execution(*id)?;
            match format {
                OutputFormat::Json => print_json(&details)?,
                OutputFormat::Text => print!("{}", output::execution_details(&details)),
            }
        }

        Command::Search {
            query,
            limit,
            advanced,
            weights,
        } => {
            let limit = limit.unwrap_or(memory.default_limit());

            if *advanced {
                let results = if weights.is_empty() {
                    memory.search_advanced(query, limit)?
                } else {
                    let update: WeightUpdate = weights.iter().copied().collect();
                    let scorer = memory
                        .scorer()
                        .with_weights(&update)
                        .context("invalid weight override")?;
                    memory.search_advanced_with(&scorer, query, limit)?
                };
                match format {
                    OutputFormat::Json => print_json(&results)?,
                    OutputFormat::Text => print!("{}", output::scored_results(&results)),
                }
            } else {
                let matches = memory.search(query, limit)?;
                match format {
                    OutputFormat::Json => print_json(&matches)?,
                    OutputFormat::Text => print!("{}", output::text_matches(&matches)),
                }
            }
        }

        Command::Stats => {
            let overview = memory.get_stats()?;
            match format {
                OutputFormat::Json => print_json(&overview)?,
                OutputFormat::Text => print!("{}", output::overview(&overview)),
            }
        }

        Command::Analytics => {
            let report = memory.get_analytics()?;
            match format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => print!("{}", output::analytics(&report)),
            }
        }

        Command::Weights => {
            let weights = memory.get_weights();
            match format {
                OutputFormat::Json => print_json(&weights)?,
                OutputFormat::Text => print!("{}", output::weights(&weights)),
            }
        }

        Command::Cleanup { older_than_days } => {
            let retention_days = older_than_days.unwrap_or(config.storage.retention_days);
            let deleted = memory.cleanup(retention_days)?;
            match format {
                OutputFormat::Json => print_json(&Cleaned {
                    retention_days,
                    deleted,
                })?,
                OutputFormat::Text => println!(
                    "Deleted {} execution(s) older than {} days",
                    deleted, retention_days
                ),
            }
        }

        Command::Repair => {
            let orphaned = memory.check_integrity()?;
            let removed = if orphaned > 0 { memory.repair()? } else { 0 };
            match format {
                OutputFormat::Json => print_json(&Repaired { orphaned, removed })?,
                OutputFormat::Text if orphaned == 0 => println!("No orphaned metric entries"),
                OutputFormat::Text => {
                    println!("Removed {} orphaned metric entries", removed)
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weight() {
        assert_eq!(parse_weight("ftsScore=0.4").unwrap(), (Factor::Fts, 0.4));
        assert_eq!(
            parse_weight(" semanticScore = 1 ").unwrap(),
            (Factor::Semantic, 1.0)
        );
        assert!(parse_weight("ftsScore").is_err());
        assert!(parse_weight("bogusScore=0.1").is_err());
        assert!(parse_weight("ftsScore=lots").is_err());
    }

    #[test]
    fn test_weight_requires_advanced() {
        let parsed = Args::try_parse_from(["execmem", "search", "q", "--weight", "ftsScore=1"]);
        assert!(parsed.is_err());

        let parsed =
            Args::try_parse_from(["execmem", "search", "q", "-a", "--weight", "ftsScore=1"]);
        assert!(parsed.is_ok());
    }
}
