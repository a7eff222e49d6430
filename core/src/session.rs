//! Per-session assistant thread
//!
//! A session key maps to at most one remote thread. The id is created on
//! first use, persisted through a [`SessionStore`] and reused until reset.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use ava_protocol::ThreadId;
use ava_state::SessionStore;

use crate::assistants::AssistantsClient;
use crate::error::Result;

pub struct ThreadSession {
  client: AssistantsClient,
  store: Arc<dyn SessionStore>,
  session_key: String,
  // Held across creation so concurrent callers share one thread
  current: Mutex<Option<ThreadId>>,
}

impl ThreadSession {
  pub fn new(
    client: AssistantsClient,
    store: Arc<dyn SessionStore>,
    session_key: impl Into<String>,
  ) -> Self {
    Self {
      client,
      store,
      session_key: session_key.into(),
      current: Mutex::new(None),
    }
  }

  pub fn session_key(&self) -> &str {
    &self.session_key
  }

  pub fn store(&self) -> &Arc<dyn SessionStore> {
    &self.store
  }

  /// The session's thread, created and persisted if none is stored yet
  pub async fn thread_id(&self) -> Result<ThreadId> {
    let mut current = self.current.lock().await;
    if let Some(id) = current.as_ref() {
      return Ok(id.clone());
    }

    if let Some(id) = self.store.load_thread(&self.session_key).await? {
      debug!(session = %self.session_key, thread_id = %id, "reusing stored thread");
      *current = Some(id.clone());
      return Ok(id);
    }

    let id = self.client.create_thread().await?;
    self.store.save_thread(&self.session_key, &id).await?;
    *current = Some(id.clone());
    Ok(id)
  }

  /// The stored thread, without creating one
  pub async fn existing_thread_id(&self) -> Result<Option<ThreadId>> {
    let current = self.current.lock().await;
    if current.is_some() {
      return Ok(current.clone());
    }
    Ok(self.store.load_thread(&self.session_key).await?)
  }

  /// Forget the thread; the next [`Self::thread_id`] creates a new one
  pub async fn reset(&self) -> Result<()> {
    let mut current = self.current.lock().await;
    self.store.clear_thread(&self.session_key).await?;
    *current = None;
    info!(session = %self.session_key, "session thread reset");
    Ok(())
  }
}
