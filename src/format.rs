//! Rule-based result-to-text formatting.
//!
//! An ordered decision table keyed on question keywords turns raw result
//! rows into a natural-language answer. The first branch whose renderer
//! produces text wins; a renderer may inspect the row shape and decline,
//! letting later branches try. Order is the contract — the specific
//! templates sit above the generic dumps.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::dataset::{cell_to_f64, cell_to_string, Row};

/// A leading "first N" shape; a bare "first" is usually temporal
/// ("when did it first appear?"), not an enumeration request.
static FIRST_N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bfirst \d+").unwrap());

/// Fixed sentinel for unanswerable questions. Also recognized verbatim in
/// summarization replies.
pub const UNKNOWN_ANSWER: &str = "I don't know.";

/// Rows shown by the filtered-list branch before eliding.
const LIST_CAP: usize = 10;
/// Rows shown by the default dump before eliding.
const DUMP_CAP: usize = 5;

struct Ctx<'a> {
    q: String,
    rows: &'a [Row],
}

impl Ctx<'_> {
    fn contains_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.q.contains(k))
    }

    fn has_average(&self) -> bool {
        self.contains_any(&["average", "mean "])
    }

    fn has_max(&self) -> bool {
        self.contains_any(&["highest", "largest", "biggest", "maximum", "most"])
    }

    fn has_min(&self) -> bool {
        self.contains_any(&["lowest", "smallest", "minimum", "least"])
    }

    fn has_salary(&self) -> bool {
        self.contains_any(&["salary", "salaries", "wage", "pay", "income"])
    }

    /// Single row, single column: the scalar shape aggregates produce.
    fn scalar(&self) -> Option<&Value> {
        match self.rows {
            [row] if row.len() == 1 => Some(&row[0].1),
            _ => None,
        }
    }
}

struct Branch {
    name: &'static str,
    applies: fn(&Ctx) -> bool,
    render: fn(&Ctx) -> Option<String>,
}

static BRANCHES: &[Branch] = &[
    Branch {
        name: "count",
        applies: |c| c.contains_any(&["how many", "count", "number of"]),
        render: render_count,
    },
    Branch {
        name: "top_n",
        applies: |c| c.q.contains("top ") || FIRST_N.is_match(&c.q),
        render: render_top_n,
    },
    Branch {
        // Average questions with a superlative fall through to the average
        // templates below.
        name: "superlative",
        applies: |c| (c.has_max() || c.has_min()) && !c.has_average(),
        render: render_superlative,
    },
    Branch {
        name: "average",
        applies: |c| c.has_average(),
        render: render_average,
    },
    Branch {
        name: "grouped",
        applies: |c| c.contains_any(&["each ", "per ", "group", "statistic", "breakdown"]),
        render: render_grouped,
    },
    Branch {
        name: "filtered",
        applies: |c| c.contains_any(&["whose", "which", "where", "with ", "of the"]),
        render: render_filtered,
    },
];

/// Render `rows` as a natural-language answer to `question`.
/// Empty results are always the unknown sentinel, regardless of question.
pub fn format_answer(question: &str, _sql: &str, rows: &[Row]) -> String {
    if rows.is_empty() {
        return UNKNOWN_ANSWER.to_string();
    }

    let ctx = Ctx { q: question.to_lowercase(), rows };
    for branch in BRANCHES {
        if !(branch.applies)(&ctx) {
            continue;
        }
        if let Some(text) = (branch.render)(&ctx) {
            tracing::debug!(branch = branch.name, "formatter branch matched");
            return text;
        }
    }
    render_default(&ctx)
}

// ── Branch renderers ──────────────────────────────────────────────────────────

fn render_count(ctx: &Ctx) -> Option<String> {
    let count = cell_to_string(ctx.scalar()?);
    if ctx.contains_any(&["row"]) {
        Some(format!("The dataset has {count} rows."))
    } else if ctx.contains_any(&["people", "person", "employee"]) {
        Some(format!("There are {count} people."))
    } else {
        Some(format!("The total count is {count}."))
    }
}

fn render_top_n(ctx: &Ctx) -> Option<String> {
    let mut out = format!("Here are the first {} records:\n\n", ctx.rows.len());
    for (i, row) in ctx.rows.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, join_row(row)));
    }
    Some(out)
}

fn render_superlative(ctx: &Ctx) -> Option<String> {
    let row = ctx.rows.first()?;
    let direction = if ctx.has_min() { "lowest" } else { "highest" };

    if ctx.has_salary() {
        let name = field_like(row, &["name"]);
        let salary = field_like(row, &["salary", "wage", "income"]);
        if let (Some(name), Some(salary)) = (name, salary) {
            return Some(format!("{name} has the {direction} salary at {salary}."));
        }
    }

    let kind = if ctx.has_min() { "minimum" } else { "maximum" };
    Some(format!("Record with the {kind} value: {}", join_row(row)))
}

fn render_average(ctx: &Ctx) -> Option<String> {
    if let Some(v) = ctx.scalar() {
        let shown = format_numeric(v);
        return Some(if ctx.has_salary() {
            format!("The average salary is {shown}.")
        } else {
            format!("The average value is {shown}.")
        });
    }

    // Single grouped row (department, avg) — the superlative-department shape.
    if let [row] = ctx.rows {
        let dept = field_like(row, &["department", "dept", "division", "team"]);
        let avg = field_like_raw(row, &["avg", "average"]);
        if let (Some(dept), Some(avg)) = (dept, avg) {
            let shown = format_numeric(avg);
            return Some(if ctx.has_max() {
                format!("{dept} has the highest average salary at {shown}.")
            } else if ctx.has_min() {
                format!("{dept} has the lowest average salary at {shown}.")
            } else {
                format!("The average salary in {dept} is {shown}.")
            });
        }
    }

    None
}

fn render_grouped(ctx: &Ctx) -> Option<String> {
    let mut out = String::from("Here is the breakdown:\n\n");
    for row in ctx.rows {
        let parts: Vec<String> = row
            .iter()
            .map(|(k, v)| {
                let key = k.to_lowercase();
                if key.contains("count") {
                    format!("{} records", cell_to_string(v))
                } else if key.contains("avg") || key.contains("average") {
                    format!("average {}", format_numeric(v))
                } else {
                    format!("{k}: {}", cell_to_string(v))
                }
            })
            .collect();
        out.push_str(&format!("• {}\n", parts.join(", ")));
    }
    Some(out)
}

fn render_filtered(ctx: &Ctx) -> Option<String> {
    if let [row] = ctx.rows {
        return Some(format!("Found 1 record:\n{}", join_row(row)));
    }
    let mut out = format!("Found {} records:\n\n", ctx.rows.len());
    for (i, row) in ctx.rows.iter().take(LIST_CAP).enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, join_row(row)));
    }
    if ctx.rows.len() > LIST_CAP {
        out.push_str(&format!("... and {} more records", ctx.rows.len() - LIST_CAP));
    }
    Some(out)
}

fn render_default(ctx: &Ctx) -> String {
    if let Some(v) = ctx.scalar() {
        return format!("Result: {}", cell_to_string(v));
    }
    if ctx.rows.len() <= DUMP_CAP {
        let mut out = format!("Found {} records:\n\n", ctx.rows.len());
        for (i, row) in ctx.rows.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, join_row(row)));
        }
        return out;
    }
    let mut out = format!(
        "Found {} records, showing the first {DUMP_CAP}:\n\n",
        ctx.rows.len()
    );
    for (i, row) in ctx.rows.iter().take(DUMP_CAP).enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, join_row(row)));
    }
    out.push_str(&format!("... and {} more records", ctx.rows.len() - DUMP_CAP));
    out
}

// ── Rendering helpers ─────────────────────────────────────────────────────────

/// Every column as `key: value`, comma-joined.
fn join_row(row: &Row) -> String {
    row.iter()
        .map(|(k, v)| format!("{k}: {}", cell_to_string(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Value of the first field whose key contains one of `needles`.
fn field_like(row: &Row, needles: &[&str]) -> Option<String> {
    field_like_raw(row, needles).map(cell_to_string)
}

fn field_like_raw<'a>(row: &'a Row, needles: &[&str]) -> Option<&'a Value> {
    row.iter()
        .find(|(k, _)| {
            let key = k.to_lowercase();
            needles.iter().any(|n| key.contains(n))
        })
        .map(|(_, v)| v)
}

/// Two-decimal rendering for numerics, verbatim otherwise.
fn format_numeric(v: &Value) -> String {
    match cell_to_f64(v) {
        Some(f) => format!("{f:.2}"),
        None => cell_to_string(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn empty_rows_always_unknown() {
        assert_eq!(format_answer("how many rows?", "SELECT 1", &[]), UNKNOWN_ANSWER);
        assert_eq!(format_answer("anything at all", "SELECT 1", &[]), UNKNOWN_ANSWER);
    }

    #[test]
    fn count_scalar_row_phrasing() {
        let rows = vec![row(&[("total_rows", json!(42))])];
        assert_eq!(
            format_answer("how many rows are there?", "", &rows),
            "The dataset has 42 rows."
        );
        let rows = vec![row(&[("count", json!(7))])];
        assert_eq!(
            format_answer("how many people are there?", "", &rows),
            "There are 7 people."
        );
    }

    #[test]
    fn count_with_grouped_shape_falls_through() {
        // Two rows: the scalar template declines, the dump takes over.
        let rows = vec![
            row(&[("department", json!("Sales")), ("count", json!(3))]),
            row(&[("department", json!("HR")), ("count", json!(2))]),
        ];
        let out = format_answer("how many in total?", "", &rows);
        assert!(out.contains("Sales"));
        assert!(out.contains("HR"));
    }

    #[test]
    fn top_n_lists_every_column() {
        let rows = vec![
            row(&[("name", json!("Ada")), ("salary", json!(9000))]),
            row(&[("name", json!("Grace")), ("salary", json!(8000))]),
        ];
        let out = format_answer("show the top 2 employees", "", &rows);
        assert!(out.starts_with("Here are the first 2 records:"));
        assert!(out.contains("1. name: Ada, salary: 9000"));
        assert!(out.contains("2. name: Grace, salary: 8000"));
    }

    #[test]
    fn bare_first_is_not_an_enumeration_request() {
        let rows = vec![row(&[("Genus", json!("Endoceras")), ("FirstAppearance_Ma", json!(470.0))])];
        let out = format_answer("when did it first appear?", "", &rows);
        assert!(!out.starts_with("Here are the first"));
        assert!(out.contains("Endoceras"));
    }

    #[test]
    fn superlative_with_salary_and_name_uses_template() {
        let rows = vec![row(&[("name", json!("Ada")), ("salary", json!(9000))])];
        assert_eq!(
            format_answer("who has the highest salary?", "", &rows),
            "Ada has the highest salary at 9000."
        );
        assert_eq!(
            format_answer("who has the lowest salary?", "", &rows),
            "Ada has the lowest salary at 9000."
        );
    }

    #[test]
    fn superlative_without_named_fields_joins_record() {
        let rows = vec![row(&[("sample", json!("S-1")), ("value", json!(3))])];
        let out = format_answer("which has the highest value?", "", &rows);
        assert_eq!(out, "Record with the maximum value: sample: S-1, value: 3");
    }

    #[test]
    fn average_scalar() {
        let rows = vec![row(&[("avg_salary", json!(6500.5))])];
        assert_eq!(
            format_answer("what is the average salary?", "", &rows),
            "The average salary is 6500.50."
        );
    }

    #[test]
    fn grouped_average_superlative_template() {
        let rows = vec![row(&[("department", json!("Sales")), ("avg_salary", json!(8500.0))])];
        assert_eq!(
            format_answer("which department has the highest average salary?", "", &rows),
            "Sales has the highest average salary at 8500.00."
        );
    }

    #[test]
    fn grouped_breakdown_bullets() {
        let rows = vec![
            row(&[("department", json!("Sales")), ("count", json!(3)), ("avg_salary", json!(8500.0))]),
            row(&[("department", json!("HR")), ("count", json!(2)), ("avg_salary", json!(6000.0))]),
        ];
        let out = format_answer("show statistics per department", "", &rows);
        assert!(out.starts_with("Here is the breakdown:"));
        assert!(out.contains("• department: Sales, 3 records, average 8500.00"));
        assert!(out.contains("• department: HR, 2 records, average 6000.00"));
    }

    #[test]
    fn filtered_list_caps_at_ten() {
        let rows: Vec<Row> = (0..13).map(|i| row(&[("name", json!(format!("p{i}")))])).collect();
        let out = format_answer("employees with a bonus", "", &rows);
        assert!(out.starts_with("Found 13 records:"));
        assert!(out.contains("10. name: p9"));
        assert!(!out.contains("name: p10"));
        assert!(out.contains("... and 3 more records"));
    }

    #[test]
    fn default_dump_small_and_large() {
        let small: Vec<Row> = (0..3).map(|i| row(&[("v", json!(i))])).collect();
        let out = format_answer("data please", "", &small);
        assert!(out.starts_with("Found 3 records:"));
        assert!(out.contains("3. v: 2"));

        let large: Vec<Row> = (0..9).map(|i| row(&[("v", json!(i))])).collect();
        let out = format_answer("data please", "", &large);
        assert!(out.starts_with("Found 9 records, showing the first 5:"));
        assert!(out.contains("... and 4 more records"));
    }

    #[test]
    fn default_single_scalar() {
        let rows = vec![row(&[("value", json!("blue"))])];
        assert_eq!(format_answer("data please", "", &rows), "Result: blue");
    }
}
