//! Conversation store — bounded per-conversation turn history.
//!
//! Each conversation holds the 10 most recent turns (oldest evicted first).
//! Append + truncate happens under the per-conversation mutex so concurrent
//! questions against the same conversation keep their ordering; different
//! conversations never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::AppError;

/// Maximum turns retained per conversation.
pub const MAX_TURNS: usize = 10;

/// One (question, answer) exchange.
///
/// The answer is kept as two explicit fields: `trace` carries the executed
/// SQL display (transparency mode), `narrative` the natural-language
/// payload. Reference resolution and summarization consume only the
/// narrative.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub question: String,
    /// Executed-query display, present only in transparency mode.
    pub trace: Option<String>,
    /// Natural-language answer; never empty (the unknown sentinel stands in).
    pub narrative: String,
}

impl Turn {
    /// Full answer text as shown to the caller.
    pub fn display_answer(&self) -> String {
        match &self.trace {
            Some(sql) => format!("Query: {sql}\n\n{}", self.narrative),
            None => self.narrative.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub dataset_id: String,
    pub created_at: String,
    pub turns: Vec<Turn>,
}

/// Map of conversation id → conversation, keyed by opaque identifiers.
#[derive(Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, Arc<Mutex<Conversation>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty conversation under `dataset_id` and return its id.
    pub fn create(&self, dataset_id: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let conv = Conversation {
            id: id.clone(),
            dataset_id: dataset_id.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            turns: Vec::new(),
        };
        let mut map = self.conversations.write().unwrap_or_else(|e| e.into_inner());
        map.insert(id.clone(), Arc::new(Mutex::new(conv)));
        info!(conversation_id = %id, dataset_id = %dataset_id, "conversation created");
        id
    }

    fn entry(&self, id: &str) -> Result<Arc<Mutex<Conversation>>, AppError> {
        let map = self.conversations.read().unwrap_or_else(|e| e.into_inner());
        map.get(id)
            .cloned()
            .ok_or_else(|| AppError::ConversationNotFound(id.to_string()))
    }

    /// Snapshot of a conversation's current state.
    pub fn get(&self, id: &str) -> Result<Conversation, AppError> {
        let entry = self.entry(id)?;
        let conv = entry.lock().unwrap_or_else(|e| e.into_inner());
        Ok(conv.clone())
    }

    /// Snapshot of just the turn history (resolver input).
    pub fn turns(&self, id: &str) -> Result<Vec<Turn>, AppError> {
        Ok(self.get(id)?.turns)
    }

    /// Append a turn, evicting the oldest beyond [`MAX_TURNS`].
    pub fn append(&self, id: &str, turn: Turn) -> Result<(), AppError> {
        let entry = self.entry(id)?;
        let mut conv = entry.lock().unwrap_or_else(|e| e.into_inner());
        conv.turns.push(turn);
        while conv.turns.len() > MAX_TURNS {
            conv.turns.remove(0);
        }
        debug!(conversation_id = %id, turns = conv.turns.len(), "turn appended");
        Ok(())
    }

    /// Drop all turns but keep the conversation.
    pub fn clear(&self, id: &str) -> Result<(), AppError> {
        let entry = self.entry(id)?;
        let mut conv = entry.lock().unwrap_or_else(|e| e.into_inner());
        conv.turns.clear();
        Ok(())
    }

    /// All conversations belonging to a dataset.
    pub fn list_for_dataset(&self, dataset_id: &str) -> Vec<Conversation> {
        let map = self.conversations.read().unwrap_or_else(|e| e.into_inner());
        map.values()
            .map(|entry| entry.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .filter(|c| c.dataset_id == dataset_id)
            .collect()
    }

    /// Remove every conversation under a dataset (dataset deletion).
    pub fn remove_for_dataset(&self, dataset_id: &str) {
        let mut map = self.conversations.write().unwrap_or_else(|e| e.into_inner());
        map.retain(|_, entry| {
            entry.lock().unwrap_or_else(|e| e.into_inner()).dataset_id != dataset_id
        });
    }
}
