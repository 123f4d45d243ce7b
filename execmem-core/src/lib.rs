//! # execmem-core
//!
//! Core library for execmem - an execution memory for coding agents.
//!
//! This library provides:
//! - Domain types for executions, actions, and metrics
//! - Database storage layer with SQLite and FTS5 text matching
//! - An eight-factor relevance scorer for past executions
//! - Analytics roll-ups and rule-based insights
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! A query flows through three stages:
//! - **Text match:** the FTS index returns candidates with a base rank
//! - **Enrichment:** each candidate picks up metadata and history from the store
//! - **Scoring:** factor scores are combined with the current weights and sorted
//!
//! ## Example
//!
//! ```rust,no_run
//! use execmem_core::{Config, ExecutionMemory, NewExecution};
//!
//! let config = Config::load().expect("failed to load config");
//! let memory = ExecutionMemory::open(&config).expect("failed to open store");
//!
//! memory
//!     .record_execution(&NewExecution::new("Fix null pointer in parser", true))
//!     .expect("failed to record");
//!
//! for result in memory.search_advanced("parser bug", 5).expect("search failed") {
//!     println!("{:.3} {}", result.relevance_score, result.summary);
//! }
//! ```

// Re-export commonly used items at the crate root
pub use analytics::AnalyticsReport;
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use memory::{ExecutionDetails, ExecutionMemory};
pub use scoring::{Factor, HistoryStore, ScoredResult, Scorer, WeightUpdate, Weights};
pub use search::{TextMatch, TextMatchProvider};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod memory;
pub mod scoring;
pub mod search;
pub mod types;
