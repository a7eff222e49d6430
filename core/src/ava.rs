//! Wiring from [`Config`] to a ready [`Conversation`]

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use ava_config::{Config, StorageBackend, StorageConfig};
use ava_state::{FileStore, MemoryStore, SessionStore, StateDb};

use crate::assistants::AssistantsClient;
use crate::avatar::{Animator, DidAnimator};
use crate::conversation::Conversation;
use crate::error::Result;
use crate::poll::PollPolicy;
use crate::session::ThreadSession;

/// Open the configured session store. Relative defaults resolve under `home`.
pub async fn open_store(storage: &StorageConfig, home: &Path) -> Result<Arc<dyn SessionStore>> {
  let store: Arc<dyn SessionStore> = match storage.backend {
    StorageBackend::Memory => Arc::new(MemoryStore::new()),
    StorageBackend::File => Arc::new(FileStore::new(storage.resolved_path(home))),
    StorageBackend::Sqlite => Arc::new(StateDb::open(&storage.resolved_path(home)).await?),
  };
  info!(backend = ?storage.backend, "opened session store");
  Ok(store)
}

/// Top-level handle: one conversation bound to the configured session
pub struct Ava {
  config: Config,
  conversation: Arc<Conversation>,
}

impl Ava {
  /// Build from configuration. `animate` attaches the configured avatar
  /// renderer regardless of `avatar.enabled`.
  pub async fn from_config(config: Config, home: &Path, animate: bool) -> Result<Self> {
    let store = open_store(&config.storage, home).await?;
    Self::with_store(config, store, animate)
  }

  pub fn with_store(config: Config, store: Arc<dyn SessionStore>, animate: bool) -> Result<Self> {
    let client = AssistantsClient::from_config(&config)?;
    let assistant_id = config.openai.resolve_assistant_id()?;
    let session = Arc::new(ThreadSession::new(
      client.clone(),
      store,
      config.storage.session_key.clone(),
    ));

    let mut conversation = Conversation::new(client, session, assistant_id)
      .with_run_policy(PollPolicy::from(&config.polling.run))
      .with_message_limit(config.openai.message_limit);
    if animate || config.avatar.enabled {
      let animator: Arc<dyn Animator> = Arc::new(DidAnimator::from_config(&config)?);
      conversation = conversation.with_animator(animator);
    }

    Ok(Self {
      config,
      conversation: Arc::new(conversation),
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn conversation(&self) -> &Arc<Conversation> {
    &self.conversation
  }
}
