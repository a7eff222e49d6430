// In-memory session store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use ava_protocol::{ChatMessage, ThreadId};

use crate::{Result, SessionStore};

#[derive(Default)]
struct MemoryState {
    threads: HashMap<String, ThreadId>,
    transcripts: HashMap<ThreadId, Vec<ChatMessage>>,
}

/// Session store that lives as long as the process
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_thread(&self, session_key: &str) -> Result<Option<ThreadId>> {
        Ok(self.state.lock().await.threads.get(session_key).cloned())
    }

    async fn save_thread(&self, session_key: &str, thread_id: &ThreadId) -> Result<()> {
        self.state
            .lock()
            .await
            .threads
            .insert(session_key.to_string(), thread_id.clone());
        Ok(())
    }

    async fn clear_thread(&self, session_key: &str) -> Result<()> {
        self.state.lock().await.threads.remove(session_key);
        Ok(())
    }

    async fn append_message(&self, thread_id: &ThreadId, message: &ChatMessage) -> Result<()> {
        self.state
            .lock()
            .await
            .transcripts
            .entry(thread_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn messages(&self, thread_id: &ThreadId) -> Result<Vec<ChatMessage>> {
        Ok(self
            .state
            .lock()
            .await
            .transcripts
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slots_are_independent() {
        let store = MemoryStore::new();
        store.save_thread("a", &ThreadId::new("thread_a")).await.unwrap();
        assert_eq!(store.load_thread("b").await.unwrap(), None);
        assert_eq!(
            store.load_thread("a").await.unwrap(),
            Some(ThreadId::new("thread_a"))
        );

        store.clear_thread("a").await.unwrap();
        assert_eq!(store.load_thread("a").await.unwrap(), None);
    }
}
