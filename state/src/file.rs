// File-based session store
// Whole-file JSON document, rewritten on every change

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use ava_protocol::{ChatMessage, ThreadId};

use crate::{Result, SessionStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    threads: HashMap<String, ThreadId>,
    #[serde(default)]
    transcripts: HashMap<String, Vec<ChatMessage>>,
}

/// JSON file store, the CLI's stand-in for browser storage
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SessionFile> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(SessionFile::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(SessionFile::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, data: &SessionFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load_thread(&self, session_key: &str) -> Result<Option<ThreadId>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.threads.get(session_key).cloned())
    }

    async fn save_thread(&self, session_key: &str, thread_id: &ThreadId) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        data.threads.insert(session_key.to_string(), thread_id.clone());
        self.save(&data).await
    }

    async fn clear_thread(&self, session_key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        if data.threads.remove(session_key).is_some() {
            self.save(&data).await?;
        }
        Ok(())
    }

    async fn append_message(&self, thread_id: &ThreadId, message: &ChatMessage) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        data.transcripts
            .entry(thread_id.to_string())
            .or_default()
            .push(message.clone());
        self.save(&data).await
    }

    async fn messages(&self, thread_id: &ThreadId) -> Result<Vec<ChatMessage>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .transcripts
            .remove(thread_id.as_str())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateError;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let thread = ThreadId::new("thread_1");

        let store = FileStore::new(path.clone());
        store.save_thread("default", &thread).await.unwrap();
        store
            .append_message(&thread, &ChatMessage::assistant("msg_1", "Hello"))
            .await
            .unwrap();

        let reopened = FileStore::new(path);
        assert_eq!(reopened.load_thread("default").await.unwrap(), Some(thread.clone()));
        let messages = reopened.messages(&thread).await.unwrap();
        assert_eq!(messages, vec![ChatMessage::assistant("msg_1", "Hello")]);
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load_thread("default").await.unwrap(), None);
        assert!(store.messages(&ThreadId::new("t")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStore::new(path);
        assert!(matches!(
            store.load_thread("default").await,
            Err(StateError::Json(_))
        ));
    }
}
