//! Process-wide stores for datasets and conversations.
//!
//! Both stores are explicit objects created at process start and injected
//! into request handling — never ambient globals. Locks guard only the map
//! and turn-list mutations; they are never held across backend or provider
//! calls.

pub mod conversations;
pub mod sessions;

pub use conversations::{Conversation, ConversationStore, Turn, MAX_TURNS};
pub use sessions::{DatasetInfo, SessionStore};
