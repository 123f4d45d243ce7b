//! Values a factor falls back to when there is no data to score from.
//!
//! Kept in one place so the no-data behaviour of every factor can be
//! asserted directly.

/// Success rate when no similar past executions exist
pub const SUCCESS_RATE: f64 = 0.5;

/// Frequency score when no past prompt mentions a query word
pub const FREQUENCY: f64 = 0.5;

/// Confidence when the execution has no confidence metric
pub const CONFIDENCE: f64 = 0.5;

/// Complexity when the execution has no complexity metric
pub const COMPLEXITY: u8 = 5;

/// Category when the execution has no category metric
pub const CATEGORY: &str = "general";

/// Priority when the execution has no priority metric
pub const PRIORITY: &str = "medium";
