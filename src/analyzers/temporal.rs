//! Taxonomic temporal-range analyzer.
//!
//! For paleontological datasets with genus, first-appearance and
//! last-appearance columns (ages in Ma, millions of years before present,
//! larger = older). Answers longest-duration questions and Ordovician
//! era-membership filters.
//!
//! The era thresholds (485.4, 443.8, 458.4) and the `first > last` guard in
//! the late-Ordovician sub-case are fixed constants matched to the
//! reference dataset; they are kept exactly as documented.

use std::sync::LazyLock;

use regex::Regex;

use crate::dataset::{cell_to_f64, cell_to_string, find_column, row_get, Row};

use super::Analyzer;

/// Returned verbatim when an era filter selects nothing.
pub const NO_MATCHES_SENTINEL: &str = "No matching genera were found for those criteria.";

/// Ordovician period bounds in Ma.
const ORDOVICIAN_START: f64 = 485.4;
const ORDOVICIAN_END: f64 = 443.8;
/// Start of the Late Ordovician epoch in Ma.
const LATE_ORDOVICIAN_START: f64 = 458.4;

static MA_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bma\b").unwrap());

const TRIGGER_KEYWORDS: &[&str] =
    &["duration", "ordovician", "genus", "genera", "fossil", "million years", "geologic time"];

pub struct TemporalRangeAnalyzer;

impl Analyzer for TemporalRangeAnalyzer {
    fn name(&self) -> &'static str {
        "temporal_range"
    }

    fn matches(&self, question: &str) -> bool {
        let q = question.to_lowercase();
        TRIGGER_KEYWORDS.iter().any(|k| q.contains(k)) || MA_WORD.is_match(question)
    }

    fn analyze(&self, question: &str, columns: &[String], rows: &[Row]) -> Option<String> {
        let genus_col = find_column(columns, &["genus"])?;
        let first_col = first_appearance_column(columns)?;
        let last_col = last_appearance_column(columns)?;
        let period_col = find_column(columns, &["period"]);

        let q = question.to_lowercase();

        if asks_longest_duration(&q) {
            return longest_duration(rows, genus_col, first_col, last_col, period_col);
        }

        if q.contains("ordovician") {
            return Some(ordovician_filter(rows, genus_col, first_col, last_col, q.contains("late ordovician")));
        }

        None
    }
}

/// `first` + `ma` in the column name, e.g. `FirstAppearance_Ma`.
fn first_appearance_column(columns: &[String]) -> Option<&str> {
    columns.iter().map(|c| c.as_str()).find(|c| {
        let lower = c.to_lowercase();
        lower.contains("first") && lower.contains("ma")
    })
}

fn last_appearance_column(columns: &[String]) -> Option<&str> {
    columns.iter().map(|c| c.as_str()).find(|c| {
        let lower = c.to_lowercase();
        lower.contains("last") && lower.contains("ma")
    })
}

fn asks_longest_duration(q: &str) -> bool {
    let duration_word = q.contains("duration") || q.contains("lasted") || q.contains("persisted");
    let superlative = q.contains("longest") || q.contains("maximum") || q.contains("most");
    duration_word && superlative || q.contains("longest duration")
}

fn longest_duration(
    rows: &[Row],
    genus_col: &str,
    first_col: &str,
    last_col: &str,
    period_col: Option<&str>,
) -> Option<String> {
    // Duration = first − last: ages count down toward the present.
    let mut best: Option<(&Row, f64, f64, f64)> = None;
    for row in rows {
        let first = row_get(row, first_col).and_then(cell_to_f64);
        let last = row_get(row, last_col).and_then(cell_to_f64);
        let (Some(first), Some(last)) = (first, last) else {
            continue;
        };
        let duration = first - last;
        if best.as_ref().is_none_or(|(_, d, ..)| duration > *d) {
            best = Some((row, duration, first, last));
        }
    }
    let (row, duration, first, last) = best?;

    let genus = row_get(row, genus_col).map(cell_to_string).unwrap_or_default();
    let period_info = period_col
        .and_then(|c| row_get(row, c))
        .map(cell_to_string)
        .filter(|s| !s.is_empty())
        .map(|p| format!(", mainly within the {p} period"))
        .unwrap_or_default();

    Some(format!(
        "The genus {genus} had the longest stratigraphic duration{period_info}. \
         It first appeared {first:.1} million years ago and last appeared {last:.1} \
         million years ago, a total duration of {duration:.1} million years."
    ))
}

fn ordovician_filter(
    rows: &[Row],
    genus_col: &str,
    first_col: &str,
    last_col: &str,
    late_sub_case: bool,
) -> String {
    let mut hits: Vec<(String, f64, f64)> = Vec::new();
    for row in rows {
        let first = row_get(row, first_col).and_then(cell_to_f64);
        let last = row_get(row, last_col).and_then(cell_to_f64);
        let (Some(first), Some(last)) = (first, last) else {
            continue;
        };
        let keep = if late_sub_case {
            // Appeared by the Ordovician but already extinct before the
            // Late Ordovician began.
            first <= ORDOVICIAN_START && last > LATE_ORDOVICIAN_START && first > last
        } else {
            first <= ORDOVICIAN_START && last >= ORDOVICIAN_END
        };
        if keep {
            let genus = row_get(row, genus_col).map(cell_to_string).unwrap_or_default();
            hits.push((genus, first, last));
        }
    }

    match hits.as_slice() {
        [] => NO_MATCHES_SENTINEL.to_string(),
        [(genus, first, last)] => format!(
            "The matching genus is {genus}. It first appeared {first:.1} million years ago \
             and disappeared {last:.1} million years ago."
        ),
        many => {
            let names: Vec<&str> = many.iter().map(|(g, ..)| g.as_str()).collect();
            format!("The matching genera are: {}.", names.join(", "))
        }
    }
}
