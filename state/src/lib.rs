// Ava State
// Injectable persistence for session thread ids and transcripts

pub mod database;
pub mod file;
pub mod memory;

use async_trait::async_trait;

use ava_protocol::{ChatMessage, ThreadId};

pub use database::StateDb;
pub use file::FileStore;
pub use memory::MemoryStore;

/// State errors
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt session file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Where a session keeps its thread id and transcript.
///
/// A session key names one slot; each slot holds at most one thread id.
/// Transcripts are keyed by thread and returned in insertion order.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_thread(&self, session_key: &str) -> Result<Option<ThreadId>>;

    async fn save_thread(&self, session_key: &str, thread_id: &ThreadId) -> Result<()>;

    async fn clear_thread(&self, session_key: &str) -> Result<()>;

    async fn append_message(&self, thread_id: &ThreadId, message: &ChatMessage) -> Result<()>;

    async fn messages(&self, thread_id: &ThreadId) -> Result<Vec<ChatMessage>>;
}
