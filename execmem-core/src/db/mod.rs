//! Database layer for execmem
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for executions and metrics
//! - Full-text matching and history lookups for the scorer

pub mod repo;
pub mod schema;

pub use repo::Database;
