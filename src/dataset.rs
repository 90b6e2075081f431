//! Dataset metadata and the backing-store boundary.
//!
//! Ingestion (file parsing, encoding detection, column sanitisation,
//! persistence) happens outside this crate. What arrives here is a
//! [`Dataset`]: ordered unique column names, a row count, and a handle
//! implementing [`DatasetBackend`] that can run read-only SQL and dump the
//! full table. Result cells are `serde_json::Value`; [`sanitize_rows`]
//! replaces null and non-finite numbers with the empty-string sentinel
//! before any formatting or analysis sees them.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::AppError;

/// One result row: `(column, cell)` pairs in query output order.
pub type Row = Vec<(String, Value)>;

/// Capability handle returned by external ingestion.
///
/// Both methods may block on I/O with unbounded latency; callers must not
/// hold store locks across them.
pub trait DatasetBackend: Send + Sync {
    /// Run a read-only SQL statement and return the result rows.
    fn execute(&self, sql: &str) -> Result<Vec<Row>, AppError>;

    /// Fetch every row of the table, in storage order.
    fn fetch_all(&self) -> Result<Vec<Row>, AppError>;
}

/// A registered dataset: metadata plus its backing handle.
pub struct Dataset {
    pub id: String,
    /// Original uploaded file name, reported in metadata.
    pub file_name: String,
    /// SQL table name the backend exposes.
    pub table_name: String,
    /// Ordered, unique column names (uniqueness enforced upstream).
    pub columns: Vec<String>,
    pub row_count: usize,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    pub backend: Arc<dyn DatasetBackend>,
}

impl Dataset {
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        columns: Vec<String>,
        row_count: usize,
        backend: Arc<dyn DatasetBackend>,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            table_name: "data_table".to_string(),
            columns,
            row_count,
            created_at: chrono::Utc::now().to_rfc3339(),
            backend,
        }
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("columns", &self.columns)
            .field("row_count", &self.row_count)
            .finish()
    }
}

// ── Cell helpers ──────────────────────────────────────────────────────────────

/// Replace null and non-finite numeric cells with the empty-string sentinel.
/// Applied to every backend result before formatting or analysis.
pub fn sanitize_rows(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(k, v)| {
                    let clean = match &v {
                        Value::Null => Value::String(String::new()),
                        Value::Number(n) => match n.as_f64() {
                            Some(f) if f.is_finite() => v,
                            _ => Value::String(String::new()),
                        },
                        _ => v,
                    };
                    (k, clean)
                })
                .collect()
        })
        .collect()
}

/// Render a cell the way it appears in answers: bare strings unquoted,
/// everything else via its JSON form.
pub fn cell_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric view of a cell; strings are parsed so CSV-typed columns still
/// compute.
pub fn cell_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Look up a cell by column name.
pub fn row_get<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.iter().find(|(k, _)| k == column).map(|(_, v)| v)
}

/// First column whose lowercased name contains any of `needles`.
pub fn find_column<'a>(columns: &'a [String], needles: &[&str]) -> Option<&'a str> {
    columns.iter().map(|c| c.as_str()).find(|c| {
        let lower = c.to_lowercase();
        needles.iter().any(|n| lower.contains(n))
    })
}

// ── Canned backend ────────────────────────────────────────────────────────────

/// In-memory backend serving fixed rows regardless of the SQL it receives.
/// Used by tests and demos in place of a real storage layer.
pub struct FixedBackend {
    rows: Vec<Row>,
}

impl FixedBackend {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

impl DatasetBackend for FixedBackend {
    fn execute(&self, _sql: &str) -> Result<Vec<Row>, AppError> {
        Ok(self.rows.clone())
    }

    fn fetch_all(&self) -> Result<Vec<Row>, AppError> {
        Ok(self.rows.clone())
    }
}
