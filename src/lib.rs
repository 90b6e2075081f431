//! tablechat — conversational question answering over tabular datasets.
//!
//! Questions in natural language are turned into read-only queries against
//! a registered dataset, executed, and rendered back as text, with support
//! for short conversational follow-ups ("how much do they make?"). The
//! pipeline is deliberately rule-based: a reference resolver rewrites
//! follow-ups from history, a three-tier planner cascade produces a query
//! (provider-generated, keyword heuristics, contextual follow-up handling),
//! domain analyzers answer a few question categories directly from the full
//! dataset, and an ordered decision table formats result rows into prose.
//!
//! [`Engine`] is the public entry point; datasets arrive through
//! [`Dataset`] with a [`dataset::DatasetBackend`] handle supplied by the
//! host's ingestion layer.

pub mod analyzers;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod format;
pub mod llm;
pub mod logger;
pub mod plan;
pub mod resolve;
pub mod store;

pub use config::Config;
pub use dataset::{Dataset, DatasetBackend, Row};
pub use engine::{Engine, QueryResponse};
pub use error::AppError;
pub use format::UNKNOWN_ANSWER;
pub use store::{Conversation, DatasetInfo, Turn, MAX_TURNS};
