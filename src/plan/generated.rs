//! Tier 1 — structured NL-to-SQL generation via the LLM provider.
//!
//! The provider reply is untrusted: it may be fenced, wrapped in prose, or
//! contain no SQL at all. [`sanitize_sql`] extracts the first read-only
//! statement or reports that none exists. A provider transport failure is
//! surfaced to the cascade (which falls to tier 2); a sanitize failure is
//! `Ok(None)`.

use crate::dataset::Dataset;
use crate::llm::{LlmProvider, ProviderError};

const NL_TO_SQL_SYSTEM: &str = "You translate questions about a SQLite table into a single \
read-only SQL statement. Reply only using the statement itself, starting at SELECT, \
and never modify data.";

/// Ask the provider for SQL answering `question` over the dataset schema.
pub async fn generate(
    provider: &LlmProvider,
    dataset: &Dataset,
    question: &str,
) -> Result<Option<String>, ProviderError> {
    let prompt = format!(
        "Table: {table}\nColumns: {columns}\nRow count: {rows}\nQuestion: {question}",
        table = dataset.table_name,
        columns = dataset.columns.join(", "),
        rows = dataset.row_count,
    );
    let reply = provider.complete(&prompt, Some(NL_TO_SQL_SYSTEM)).await?;
    Ok(sanitize_sql(&reply))
}

/// Extract a read-only statement from an untrusted reply.
///
/// Strips code-fence markers, scans for the first line starting with
/// `SELECT` or `WITH` (case-insensitive), then collects lines until one
/// ends with `;`, skipping `--` comment lines and blanks. Returns `None`
/// when no opening line exists.
pub fn sanitize_sql(reply: &str) -> Option<String> {
    let cleaned = reply.replace("```sql", "").replace("```", "");

    let mut collected: Vec<&str> = Vec::new();
    let mut in_sql = false;
    for line in cleaned.lines() {
        let line = line.trim();
        let upper = line.to_uppercase();
        if !in_sql {
            if upper.starts_with("SELECT") || upper.starts_with("WITH") {
                in_sql = true;
                collected.push(line);
                if line.ends_with(';') {
                    break;
                }
            }
        } else if line.ends_with(';') {
            collected.push(line);
            break;
        } else if !line.is_empty() && !line.starts_with("--") {
            collected.push(line);
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_statement_passes() {
        let sql = sanitize_sql("SELECT * FROM data_table LIMIT 5").unwrap();
        assert_eq!(sql, "SELECT * FROM data_table LIMIT 5");
    }

    #[test]
    fn fenced_statement_is_unwrapped() {
        let reply = "```sql\nSELECT name, salary\nFROM data_table;\n```";
        let sql = sanitize_sql(reply).unwrap();
        assert_eq!(sql, "SELECT name, salary FROM data_table;");
    }

    #[test]
    fn prose_before_statement_is_skipped() {
        let reply = "Here is the query you asked for:\nSELECT COUNT(*) FROM data_table;";
        let sql = sanitize_sql(reply).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM data_table;");
    }

    #[test]
    fn comment_lines_are_dropped() {
        let reply = "SELECT name\n-- pick the table\nFROM data_table\nLIMIT 3;";
        let sql = sanitize_sql(reply).unwrap();
        assert_eq!(sql, "SELECT name FROM data_table LIMIT 3;");
    }

    #[test]
    fn with_statement_is_accepted() {
        let reply = "with t as (select 1) select * from t;";
        assert!(sanitize_sql(reply).is_some());
    }

    #[test]
    fn collection_stops_at_semicolon() {
        let reply = "SELECT 1;\nDROP TABLE data_table;";
        let sql = sanitize_sql(reply).unwrap();
        assert_eq!(sql, "SELECT 1;");
    }

    #[test]
    fn no_statement_yields_none() {
        assert!(sanitize_sql("I cannot answer that question.").is_none());
        assert!(sanitize_sql("").is_none());
        assert!(sanitize_sql("UPDATE data_table SET salary = 0;").is_none());
    }
}
