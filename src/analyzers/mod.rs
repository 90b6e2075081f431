//! Domain analyzer plug-ins.
//!
//! Narrow handlers that answer one category of domain-specific question
//! directly from the full dataset, bypassing query planning and formatting.
//! Each analyzer is side-effect-free and fall-through-safe: a question that
//! trips its trigger keywords but a dataset without the required columns
//! yields `None` and control returns to the general path. At most one
//! analyzer's result is used.

pub mod evolution;
pub mod temporal;

use crate::dataset::Row;

pub use evolution::EvolutionIndexAnalyzer;
pub use temporal::{TemporalRangeAnalyzer, NO_MATCHES_SENTINEL};

/// Uniform contract: trigger check on the question, then an optional
/// narrative computed from the full dataset.
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap keyword gate — decides whether the full dataset is even
    /// fetched for this analyzer.
    fn matches(&self, question: &str) -> bool;

    /// Compute a narrative, or fall through.
    fn analyze(&self, question: &str, columns: &[String], rows: &[Row]) -> Option<String>;
}

/// The built-in registry, in precedence order.
pub fn registry() -> Vec<Box<dyn Analyzer>> {
    vec![Box::new(EvolutionIndexAnalyzer), Box::new(TemporalRangeAnalyzer)]
}

/// Does any registered analyzer want this question?
pub fn any_matches(registry: &[Box<dyn Analyzer>], question: &str) -> bool {
    registry.iter().any(|a| a.matches(question))
}

/// First triggered analyzer that produces a narrative wins.
pub fn run(
    registry: &[Box<dyn Analyzer>],
    question: &str,
    columns: &[String],
    rows: &[Row],
) -> Option<String> {
    for analyzer in registry {
        if !analyzer.matches(question) {
            continue;
        }
        if let Some(narrative) = analyzer.analyze(question, columns, rows) {
            tracing::debug!(analyzer = analyzer.name(), "analyzer produced answer");
            return Some(narrative);
        }
    }
    None
}
