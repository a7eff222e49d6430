// Ava State Database
// SQLite session store

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use ava_protocol::{ChatMessage, MessageRole, ThreadId};

use crate::{Result, SessionStore, StateError};

/// State database handle
pub struct StateDb {
    pool: SqlitePool,
}

impl StateDb {
    /// Open (creating if missing) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        debug!(path = %db_path.display(), "opened state database");
        Self::migrate(pool).await
    }

    /// Private in-memory database, mostly for tests
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&pool)
            .await?;
        Ok(Self { pool })
    }

    /// Close the database
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SessionStore for StateDb {
    async fn load_thread(&self, session_key: &str) -> Result<Option<ThreadId>> {
        let row = sqlx::query("SELECT thread_id FROM sessions WHERE session_key = ?")
            .bind(session_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|row| row.try_get::<String, _>("thread_id"))
            .transpose()?
            .map(ThreadId::from))
    }

    async fn save_thread(&self, session_key: &str, thread_id: &ThreadId) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (session_key, thread_id, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(session_key) DO UPDATE SET \
             thread_id = excluded.thread_id, updated_at = excluded.updated_at",
        )
        .bind(session_key)
        .bind(thread_id.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_thread(&self, session_key: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_key = ?")
            .bind(session_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_message(&self, thread_id: &ThreadId, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (thread_id, message_id, role, content, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(thread_id.as_str())
        .bind(message.id.as_str())
        .bind(message.role.as_str())
        .bind(message.content.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn messages(&self, thread_id: &ThreadId) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT message_id, role, content FROM messages WHERE thread_id = ? ORDER BY seq",
        )
        .bind(thread_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<ChatMessage> {
                let role: String = row.try_get("role")?;
                let role = MessageRole::parse(&role)
                    .ok_or_else(|| StateError::Corrupt(format!("unknown role `{role}`")))?;
                Ok(ChatMessage {
                    id: row.try_get("message_id")?,
                    role,
                    content: row.try_get("content")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn upserts_thread_slot() {
        let db = StateDb::open_in_memory().await.unwrap();
        db.save_thread("default", &ThreadId::new("thread_1")).await.unwrap();
        db.save_thread("default", &ThreadId::new("thread_2")).await.unwrap();
        assert_eq!(
            db.load_thread("default").await.unwrap(),
            Some(ThreadId::new("thread_2"))
        );

        db.clear_thread("default").await.unwrap();
        assert_eq!(db.load_thread("default").await.unwrap(), None);
    }

    #[tokio::test]
    async fn transcript_keeps_insertion_order_per_thread() {
        let db = StateDb::open_in_memory().await.unwrap();
        let a = ThreadId::new("thread_a");
        let b = ThreadId::new("thread_b");
        let first = ChatMessage {
            id: "m1".to_string(),
            role: MessageRole::User,
            content: "Is there memory care near Austin?".to_string(),
        };
        let second = ChatMessage::assistant("m2", "Yes, three facilities.");

        db.append_message(&a, &first).await.unwrap();
        db.append_message(&b, &ChatMessage::assistant("x", "other")).await.unwrap();
        db.append_message(&a, &second).await.unwrap();

        assert_eq!(db.messages(&a).await.unwrap(), vec![first, second]);
        assert_eq!(db.messages(&b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("ava.sqlite");

        let db = StateDb::open(&path).await.unwrap();
        db.save_thread("default", &ThreadId::new("thread_9")).await.unwrap();
        db.close().await;

        let db = StateDb::open(&path).await.unwrap();
        assert_eq!(
            db.load_thread("default").await.unwrap(),
            Some(ThreadId::new("thread_9"))
        );
    }
}
