//! Tier 3 — contextual heuristics for pronoun follow-ups.
//!
//! Reached only when the question carries a pronoun or implicit reference
//! and history exists. One concrete mapping so far: an "average" follow-up
//! right after a highest-average-department answer re-issues the same
//! grouped-aggregate query. Anything else gets a generic preview.

use crate::dataset::Dataset;
use crate::store::Turn;

use super::heuristic::{department_column, grouped_average_sql, salary_column};
use super::preview_sql;

/// Fallback preview size for unrecognized follow-ups.
const FOLLOW_UP_PREVIEW_LIMIT: usize = 5;

pub fn from_history(question: &str, dataset: &Dataset, turns: &[Turn]) -> String {
    let q = question.to_lowercase();

    // "what do they make on average?" straight after the
    // highest-average-department answer: the grouped query answers it again.
    if q.contains("average") || q.contains("mean ") {
        if let Some(last) = turns.last() {
            if last.narrative.to_lowercase().contains("highest average") {
                return grouped_average_sql(
                    &dataset.table_name,
                    &department_column(dataset),
                    &salary_column(dataset),
                    "DESC",
                    true,
                );
            }
        }
    }

    preview_sql(&dataset.table_name, FOLLOW_UP_PREVIEW_LIMIT)
}
