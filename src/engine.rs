//! The query-resolution engine — one entry point per request kind.
//!
//! `ask` runs the full pipeline: resolve references against history, give
//! domain analyzers first refusal, otherwise plan a query through the
//! three-tier cascade, execute it, format the rows, optionally summarize
//! through the provider, and record the turn. The remaining methods are
//! thin pass-throughs to the stores.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::analyzers::{self, Analyzer};
use crate::config::Config;
use crate::dataset::{sanitize_rows, Dataset, Row};
use crate::error::AppError;
use crate::format::{format_answer, UNKNOWN_ANSWER};
use crate::llm::{providers, LlmProvider};
use crate::plan;
use crate::resolve;
use crate::store::{Conversation, ConversationStore, DatasetInfo, SessionStore, Turn};

/// System prompt for the summarization call.
const SUMMARY_SYSTEM: &str = "You summarize tabular query results. Answer the user's \
question in one or two plain sentences using only the data given. If the data cannot \
answer the question, reply exactly: I don't know.";

/// Rows included in the summarization prompt.
const SUMMARY_ROW_CAP: usize = 10;

/// Outcome of a single question.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub success: bool,
    pub conversation_id: String,
}

pub struct Engine {
    sessions: Arc<SessionStore>,
    conversations: Arc<ConversationStore>,
    provider: Option<LlmProvider>,
    registry: Vec<Box<dyn Analyzer>>,
    config: Config,
}

impl Engine {
    /// Build an engine from resolved configuration. Fails only on a
    /// misconfigured provider.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let provider = providers::build(&config.llm, config.llm_api_key.clone())
            .map_err(|e| AppError::Config(e.to_string()))?;
        if provider.is_none() {
            info!("no provider configured, running on heuristic tiers only");
        }
        Ok(Self {
            sessions: Arc::new(SessionStore::new()),
            conversations: Arc::new(ConversationStore::new()),
            provider,
            registry: analyzers::registry(),
            config,
        })
    }

    /// Hand a freshly-ingested dataset to the engine.
    pub fn register_dataset(&self, dataset: Dataset) -> Arc<Dataset> {
        self.sessions.register(dataset)
    }

    // ── The pipeline ──────────────────────────────────────────────────────────

    /// Answer `question` against a dataset, inside an existing conversation
    /// or a freshly created one.
    ///
    /// Unknown ids are the only error path; everything downstream degrades
    /// to a `success: false` response or the unknown-answer sentinel.
    pub async fn ask(
        &self,
        dataset_id: &str,
        conversation_id: Option<&str>,
        question: &str,
    ) -> Result<QueryResponse, AppError> {
        let dataset = self.sessions.get(dataset_id)?;
        let conv_id = match conversation_id {
            Some(id) => {
                // Validates existence and ownership before any work happens;
                // a conversation from another dataset would poison reference
                // resolution with foreign history.
                let conv = self.conversations.get(id)?;
                if conv.dataset_id != dataset_id {
                    return Err(AppError::ConversationNotFound(id.to_string()));
                }
                id.to_string()
            }
            None => self.conversations.create(dataset_id),
        };
        let turns = self.conversations.turns(&conv_id)?;

        let resolved = resolve::resolve(question, &turns);
        if resolved != question {
            info!(original = %question, resolved = %resolved, "references resolved");
        }

        // Domain analyzers get first refusal, keyed on the resolved question
        // so follow-ups whose trigger word only appears after substitution
        // still reach them. A fall-through returns control to the general
        // path.
        if analyzers::any_matches(&self.registry, &resolved) {
            match self.run_analyzers(&dataset, &resolved) {
                Ok(Some(narrative)) => {
                    return self.record_turn(&conv_id, question, None, narrative);
                }
                Ok(None) => {}
                Err(e) => return Ok(self.failure(&conv_id, question, e)),
            }
        }

        let plan =
            plan::build_plan(self.provider.as_ref(), &dataset, question, &resolved, &turns).await;
        if !plan.is_read_only() {
            warn!(sql = %plan.sql, "plan failed the read-only check, refusing to execute");
            return Ok(self.failure(
                &conv_id,
                question,
                AppError::Query("planned statement is not read-only".into()),
            ));
        }

        let rows = match dataset.backend.execute(&plan.sql) {
            Ok(rows) => sanitize_rows(rows),
            Err(e) => return Ok(self.failure(&conv_id, question, e)),
        };

        let mut narrative = format_answer(question, &plan.sql, &rows);
        if narrative != UNKNOWN_ANSWER {
            if let Some(summary) = self.summarize(question, &plan.sql, &rows).await {
                narrative = summary;
            }
        }

        let trace = self.config.show_query.then(|| plan.sql.clone());
        self.record_turn(&conv_id, question, trace, narrative)
    }

    /// Full-table fetch plus the analyzer registry.
    fn run_analyzers(&self, dataset: &Dataset, question: &str) -> Result<Option<String>, AppError> {
        let rows = sanitize_rows(dataset.backend.fetch_all()?);
        Ok(analyzers::run(&self.registry, question, &dataset.columns, &rows))
    }

    /// Try to rephrase formatted rows through the provider. Any failure, an
    /// empty reply, or an unknown-answer reply falls back to the rule-based
    /// text.
    async fn summarize(&self, question: &str, sql: &str, rows: &[Row]) -> Option<String> {
        let provider = self.provider.as_ref()?;

        let mut content = format!("Question: {question}\nQuery: {sql}\nData:\n");
        for row in rows.iter().take(SUMMARY_ROW_CAP) {
            let line: Vec<String> = row
                .iter()
                .map(|(k, v)| format!("{k}={}", crate::dataset::cell_to_string(v)))
                .collect();
            content.push_str(&line.join(", "));
            content.push('\n');
        }
        if rows.len() > SUMMARY_ROW_CAP {
            content.push_str(&format!("({} more rows omitted)\n", rows.len() - SUMMARY_ROW_CAP));
        }

        match provider.complete(&content, Some(SUMMARY_SYSTEM)).await {
            Ok(reply) if !reply.is_empty() && !reply.contains(UNKNOWN_ANSWER) => Some(reply),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "summarization failed, keeping rule-based answer");
                None
            }
        }
    }

    fn record_turn(
        &self,
        conv_id: &str,
        question: &str,
        trace: Option<String>,
        narrative: String,
    ) -> Result<QueryResponse, AppError> {
        let turn = Turn { question: question.to_string(), trace, narrative };
        let answer = turn.display_answer();
        self.conversations.append(conv_id, turn)?;
        Ok(QueryResponse {
            question: question.to_string(),
            answer,
            success: true,
            conversation_id: conv_id.to_string(),
        })
    }

    /// Execution failed after the id checks passed: report it without
    /// recording a turn, so history holds only answered questions.
    fn failure(&self, conv_id: &str, question: &str, error: AppError) -> QueryResponse {
        warn!(error = %error, "query execution failed");
        QueryResponse {
            question: question.to_string(),
            answer: format!("The query could not be executed: {error}"),
            success: false,
            conversation_id: conv_id.to_string(),
        }
    }

    // ── Store pass-throughs ───────────────────────────────────────────────────

    pub fn conversations(&self, dataset_id: &str) -> Result<Vec<Conversation>, AppError> {
        self.sessions.get(dataset_id)?;
        Ok(self.conversations.list_for_dataset(dataset_id))
    }

    pub fn create_conversation(&self, dataset_id: &str) -> Result<String, AppError> {
        self.sessions.get(dataset_id)?;
        Ok(self.conversations.create(dataset_id))
    }

    pub fn conversation(&self, conversation_id: &str) -> Result<Conversation, AppError> {
        self.conversations.get(conversation_id)
    }

    pub fn clear_conversation(&self, conversation_id: &str) -> Result<(), AppError> {
        self.conversations.clear(conversation_id)
    }

    pub fn dataset_info(&self, dataset_id: &str) -> Result<DatasetInfo, AppError> {
        self.sessions.info(dataset_id)
    }

    /// Remove a dataset and every conversation attached to it.
    pub fn remove_dataset(&self, dataset_id: &str) -> Result<(), AppError> {
        self.sessions.remove(dataset_id)?;
        self.conversations.remove_for_dataset(dataset_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetBackend, FixedBackend};
    use serde_json::json;

    struct FailingBackend;

    impl DatasetBackend for FailingBackend {
        fn execute(&self, _sql: &str) -> Result<Vec<Row>, AppError> {
            Err(AppError::Query("no such column: bogus".into()))
        }

        fn fetch_all(&self) -> Result<Vec<Row>, AppError> {
            Err(AppError::Query("table vanished".into()))
        }
    }

    fn engine() -> Engine {
        Engine::new(Config::test_default()).unwrap()
    }

    fn staff_dataset(id: &str, rows: Vec<Row>) -> Dataset {
        Dataset::new(
            id,
            "staff.csv",
            vec!["name".into(), "department".into(), "salary".into()],
            rows.len(),
            Arc::new(FixedBackend::new(rows)),
        )
    }

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn unknown_dataset_is_an_error() {
        let e = engine();
        let err = e.ask("missing", None, "how many rows?").await.unwrap_err();
        assert!(matches!(err, AppError::DatasetNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_conversation_is_an_error() {
        let e = engine();
        e.register_dataset(staff_dataset("ds", vec![]));
        let err = e.ask("ds", Some("missing"), "how many rows?").await.unwrap_err();
        assert!(matches!(err, AppError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn conversation_must_belong_to_the_dataset() {
        let e = engine();
        e.register_dataset(staff_dataset("ds-a", vec![]));
        e.register_dataset(staff_dataset("ds-b", vec![]));
        let conv_id = e.create_conversation("ds-a").unwrap();

        let err = e.ask("ds-b", Some(&conv_id), "how many rows?").await.unwrap_err();
        assert!(matches!(err, AppError::ConversationNotFound(_)));
        // The right pairing still works.
        assert!(e.ask("ds-a", Some(&conv_id), "how many rows?").await.is_ok());
    }

    #[tokio::test]
    async fn summarization_prompt_carries_the_executed_query() {
        // The dummy provider echoes its prompt, so the answer shows exactly
        // what summarization was given.
        let mut cfg = Config::test_default();
        cfg.llm.provider = "dummy".into();
        let e = Engine::new(cfg).unwrap();
        e.register_dataset(staff_dataset("ds", vec![row(&[("name", json!("Ada"))])]));

        let resp = e.ask("ds", None, "tell me about this dataset").await.unwrap();
        assert!(resp.answer.contains("Query: SELECT * FROM data_table LIMIT 10"));
        assert!(resp.answer.contains("name=Ada"));
    }

    #[tokio::test]
    async fn ask_creates_conversation_and_records_turn() {
        let e = engine();
        let rows = vec![row(&[("department", json!("Sales")), ("avg_salary", json!(8500.0))])];
        e.register_dataset(staff_dataset("ds", rows));

        let resp = e
            .ask("ds", None, "which department has the highest average salary?")
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!(resp.answer, "Sales has the highest average salary at 8500.00.");

        let conv = e.conversation(&resp.conversation_id).unwrap();
        assert_eq!(conv.turns.len(), 1);
        assert_eq!(conv.turns[0].narrative, resp.answer);
    }

    #[tokio::test]
    async fn empty_result_yields_unknown_sentinel() {
        let e = engine();
        e.register_dataset(staff_dataset("ds", vec![]));
        let resp = e.ask("ds", None, "what is the average salary?").await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.answer, UNKNOWN_ANSWER);
    }

    #[tokio::test]
    async fn execution_failure_is_reported_without_a_turn() {
        let e = engine();
        e.register_dataset(Dataset::new(
            "ds",
            "staff.csv",
            vec!["name".into(), "salary".into()],
            0,
            Arc::new(FailingBackend),
        ));
        let conv_id = e.create_conversation("ds").unwrap();

        let resp = e.ask("ds", Some(&conv_id), "how many rows?").await.unwrap();
        assert!(!resp.success);
        assert!(resp.answer.contains("could not be executed"));
        assert!(e.conversation(&conv_id).unwrap().turns.is_empty());
    }

    #[tokio::test]
    async fn show_query_prefixes_the_answer() {
        let mut cfg = Config::test_default();
        cfg.show_query = true;
        let e = Engine::new(cfg).unwrap();
        e.register_dataset(staff_dataset("ds", vec![row(&[("total_rows", json!(3))])]));

        let resp = e.ask("ds", None, "how many rows are there?").await.unwrap();
        assert!(resp.answer.starts_with("Query: SELECT COUNT(*)"));
        assert!(resp.answer.ends_with("The dataset has 3 rows."));

        // Stored turns carry the trace too.
        let conv = e.conversation(&resp.conversation_id).unwrap();
        assert!(conv.turns[0].trace.is_some());
    }

    #[tokio::test]
    async fn pronoun_follow_up_stays_on_topic() {
        let e = engine();
        let rows = vec![row(&[("department", json!("Sales")), ("avg_salary", json!(8500.0))])];
        e.register_dataset(staff_dataset("ds", rows));

        let first = e
            .ask("ds", None, "which department has the highest average salary?")
            .await
            .unwrap();
        let second = e
            .ask("ds", Some(&first.conversation_id), "how much do they make on average?")
            .await
            .unwrap();
        assert!(second.success);
        assert_eq!(second.answer, "The average salary in Sales is 8500.00.");
    }

    #[tokio::test]
    async fn analyzer_path_bypasses_planning() {
        let e = engine();
        let rows = vec![
            row(&[
                ("SampleID", json!("S-01")),
                ("SiO2", json!(60.0)),
                ("MgO", json!(2.0)),
                ("K2O", json!(4.0)),
            ]),
            row(&[
                ("SampleID", json!("S-02")),
                ("SiO2", json!(50.0)),
                ("MgO", json!(5.0)),
                ("K2O", json!(2.0)),
            ]),
        ];
        e.register_dataset(Dataset::new(
            "geo",
            "samples.csv",
            vec!["SampleID".into(), "SiO2".into(), "MgO".into(), "K2O".into()],
            rows.len(),
            Arc::new(FixedBackend::new(rows)),
        ));

        let resp = e.ask("geo", None, "which sample is most evolved?").await.unwrap();
        assert!(resp.success);
        assert!(resp.answer.contains("S-01"));
        assert!(resp.answer.contains("evolution index"));
    }

    #[tokio::test]
    async fn remove_dataset_drops_its_conversations() {
        let e = engine();
        e.register_dataset(staff_dataset("ds", vec![]));
        let conv_id = e.create_conversation("ds").unwrap();

        e.remove_dataset("ds").unwrap();
        assert!(e.dataset_info("ds").is_err());
        assert!(e.conversation(&conv_id).is_err());
    }

    #[tokio::test]
    async fn clear_conversation_empties_history() {
        let e = engine();
        e.register_dataset(staff_dataset("ds", vec![row(&[("total_rows", json!(1))])]));
        let resp = e.ask("ds", None, "how many rows?").await.unwrap();
        e.clear_conversation(&resp.conversation_id).unwrap();
        assert!(e.conversation(&resp.conversation_id).unwrap().turns.is_empty());
    }

    #[tokio::test]
    async fn conversations_listing_requires_known_dataset() {
        let e = engine();
        assert!(e.conversations("missing").is_err());
        e.register_dataset(staff_dataset("ds", vec![]));
        e.create_conversation("ds").unwrap();
        assert_eq!(e.conversations("ds").unwrap().len(), 1);
    }
}
