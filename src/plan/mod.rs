//! Query planning — the three-tier fallback cascade.
//!
//! Tier 1 delegates NL-to-SQL to the configured provider and sanitizes the
//! untrusted reply. Tier 2 is a deterministic keyword decision table over
//! the original question. Tier 3 handles pronoun follow-ups from
//! conversation history. The cascade never errors; its worst case is a
//! generic preview query. Every plan it produces starts with a read-only
//! statement keyword.

pub mod contextual;
pub mod generated;
pub mod heuristic;

use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::llm::LlmProvider;
use crate::resolve;
use crate::store::Turn;

/// Which tier produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOrigin {
    Generated,
    Heuristic,
    Contextual,
}

/// An executable query string tagged with its origin tier.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub sql: String,
    pub origin: PlanOrigin,
}

impl QueryPlan {
    /// Plans must begin with a read-only statement keyword before execution.
    pub fn is_read_only(&self) -> bool {
        let upper = self.sql.trim_start().to_uppercase();
        upper.starts_with("SELECT") || upper.starts_with("WITH")
    }
}

/// Default preview row limit when no provider is configured.
const PREVIEW_LIMIT_NO_PROVIDER: usize = 20;
/// Default preview row limit after a provider failure.
const PREVIEW_LIMIT_PROVIDER_FAILED: usize = 5;
/// Preview row limit when the provider replied but no SQL could be extracted.
const PREVIEW_LIMIT_SANITIZE_FAILED: usize = 10;

pub(crate) fn preview_sql(table: &str, limit: usize) -> String {
    format!("SELECT * FROM {table} LIMIT {limit}")
}

/// Run the cascade: generated → heuristic → contextual → preview.
///
/// `original_question` drives the keyword tiers (tier 2 and the
/// pronoun check); `resolved_question` is what the provider sees.
pub async fn build_plan(
    provider: Option<&LlmProvider>,
    dataset: &Dataset,
    original_question: &str,
    resolved_question: &str,
    turns: &[Turn],
) -> QueryPlan {
    // Tier 1: structured generation. One attempt, no retry.
    let default_limit = match provider {
        Some(p) => match generated::generate(p, dataset, resolved_question).await {
            Ok(Some(sql)) => {
                debug!(%sql, "plan from generation tier");
                return QueryPlan { sql, origin: PlanOrigin::Generated };
            }
            Ok(None) => {
                // Reply carried no SQL statement at all; the original
                // question may still be anything, so preview directly.
                warn!("generated reply contained no readable statement");
                return QueryPlan {
                    sql: preview_sql(&dataset.table_name, PREVIEW_LIMIT_SANITIZE_FAILED),
                    origin: PlanOrigin::Heuristic,
                };
            }
            Err(e) => {
                warn!(error = %e, "generation tier failed, falling back");
                PREVIEW_LIMIT_PROVIDER_FAILED
            }
        },
        None => PREVIEW_LIMIT_NO_PROVIDER,
    };

    // Tier 2: keyword decision table over the original question.
    if let Some(sql) = heuristic::from_keywords(original_question, dataset) {
        debug!(%sql, "plan from heuristic tier");
        return QueryPlan { sql, origin: PlanOrigin::Heuristic };
    }

    // Tier 3: contextual follow-up handling.
    if resolve::has_reference(original_question) && !turns.is_empty() {
        let sql = contextual::from_history(original_question, dataset, turns);
        debug!(%sql, "plan from contextual tier");
        return QueryPlan { sql, origin: PlanOrigin::Contextual };
    }

    QueryPlan {
        sql: preview_sql(&dataset.table_name, default_limit),
        origin: PlanOrigin::Heuristic,
    }
}
