//! Conversation history per session id, kept in memory or in a SQLite file.
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use concierge_ai::{ContentBlock, Message, MessageRole, ToolCall};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

mod conversation;
mod session_locking;
mod session_storage;
mod session_store;

pub use conversation::{items_from_messages, messages_from_items, ConversationItem, ItemRole};
pub use session_locking::SessionLocks;
pub use session_storage::{list_sessions, ListingOutcome, SessionListingEntry};
pub use session_store::{InMemorySessionStore, SessionStore, SqliteSessionStore};

pub const DEFAULT_SESSION_DB_PATH: &str = "conversation_history.db";

/// Timestamp-derived id used when the caller does not name a session.
pub fn generate_session_id() -> String {
    chrono::Local::now()
        .format("session_%Y%m%d_%H%M%S")
        .to_string()
}
