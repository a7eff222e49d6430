//! One chat conversation on top of a [`ThreadSession`]
//!
//! Keeps the local transcript, serializes turns, mirrors messages into the
//! session store and optionally renders each reply through an [`Animator`].

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{info, warn};

use ava_cancel::CancellationToken;
use ava_protocol::{ChatMessage, ThreadId, TurnErrorEvent, TurnEvent, VideoReadyEvent};

use crate::assistants::AssistantsClient;
use crate::avatar::Animator;
use crate::error::{AvaError, Result};
use crate::event::EventBroadcaster;
use crate::poll::PollPolicy;
use crate::session::ThreadSession;

/// Result of a successful turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
  pub user: ChatMessage,
  pub assistant: ChatMessage,
  /// Present when an animator is attached and rendering succeeded
  pub video_url: Option<String>,
}

pub struct Conversation {
  client: AssistantsClient,
  session: Arc<ThreadSession>,
  assistant_id: String,
  run_policy: PollPolicy,
  message_limit: u32,
  animator: Option<Arc<dyn Animator>>,
  events: EventBroadcaster,
  messages: RwLock<Vec<ChatMessage>>,
  turn_lock: Mutex<()>,
}

impl Conversation {
  pub fn new(
    client: AssistantsClient,
    session: Arc<ThreadSession>,
    assistant_id: impl Into<String>,
  ) -> Self {
    Self {
      client,
      session,
      assistant_id: assistant_id.into(),
      run_policy: PollPolicy::default(),
      message_limit: 20,
      animator: None,
      events: EventBroadcaster::default(),
      messages: RwLock::new(Vec::new()),
      turn_lock: Mutex::new(()),
    }
  }

  pub fn with_run_policy(mut self, policy: PollPolicy) -> Self {
    self.run_policy = policy;
    self
  }

  pub fn with_message_limit(mut self, limit: u32) -> Self {
    self.message_limit = limit;
    self
  }

  pub fn with_animator(mut self, animator: Arc<dyn Animator>) -> Self {
    self.animator = Some(animator);
    self
  }

  pub fn session(&self) -> &Arc<ThreadSession> {
    &self.session
  }

  pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
    self.events.subscribe()
  }

  /// Snapshot of the local transcript
  pub async fn messages(&self) -> Vec<ChatMessage> {
    self.messages.read().await.clone()
  }

  /// Replace the local transcript with the stored one for the current
  /// thread. Returns the number of messages loaded.
  pub async fn restore(&self) -> Result<usize> {
    let _turn = self.turn_lock.lock().await;
    let Some(thread_id) = self.session.existing_thread_id().await? else {
      return Ok(0);
    };
    let stored = self.session.store().messages(&thread_id).await?;
    let count = stored.len();
    *self.messages.write().await = stored;
    Ok(count)
  }

  /// Reset the session thread and clear the local transcript
  pub async fn reset(&self) -> Result<()> {
    let _turn = self.turn_lock.lock().await;
    self.session.reset().await?;
    self.messages.write().await.clear();
    Ok(())
  }

  /// Send one user message and wait for the assistant's reply.
  ///
  /// The user entry is appended before any request is made; the assistant
  /// entry only on success. Turns on the same conversation run one at a
  /// time.
  pub async fn send(&self, text: &str, cancel: &CancellationToken) -> Result<TurnOutcome> {
    let text = text.trim();
    if text.is_empty() {
      return Err(AvaError::EmptyInput);
    }

    let _turn = self.turn_lock.lock().await;

    let user = ChatMessage::user(text);
    self.messages.write().await.push(user.clone());
    self.events.emit(TurnEvent::UserMessage(user.clone()));

    let assistant = match self.exchange(&user, cancel).await {
      Ok(reply) => reply,
      Err(err) => {
        warn!(error = %err, "turn failed");
        self.events.emit(TurnEvent::TurnFailed(TurnErrorEvent {
          message_id: user.id.clone(),
          error: err.to_string(),
        }));
        return Err(err);
      }
    };

    self.messages.write().await.push(assistant.clone());
    self.events.emit(TurnEvent::AssistantMessage(assistant.clone()));

    let video_url = match &self.animator {
      Some(animator) => self.render(animator.as_ref(), &assistant, cancel).await,
      None => None,
    };

    Ok(TurnOutcome {
      user,
      assistant,
      video_url,
    })
  }

  async fn exchange(&self, user: &ChatMessage, cancel: &CancellationToken) -> Result<ChatMessage> {
    let thread_id = self.session.thread_id().await?;
    self.mirror(&thread_id, user).await;

    let reply = self
      .client
      .ask(
        &thread_id,
        &self.assistant_id,
        &user.content,
        &self.run_policy,
        self.message_limit,
        cancel,
      )
      .await?;

    self.mirror(&thread_id, &reply).await;
    info!(thread_id = %thread_id, message_id = %reply.id, "assistant replied");
    Ok(reply)
  }

  async fn render(
    &self,
    animator: &dyn Animator,
    reply: &ChatMessage,
    cancel: &CancellationToken,
  ) -> Option<String> {
    match animator.animate(&reply.content, cancel).await {
      Ok(video_url) => {
        self.events.emit(TurnEvent::VideoReady(VideoReadyEvent {
          message_id: reply.id.clone(),
          video_url: video_url.clone(),
        }));
        Some(video_url)
      }
      Err(err) => {
        warn!(message_id = %reply.id, error = %err, "avatar rendering failed");
        self.events.emit(TurnEvent::AvatarFailed(TurnErrorEvent {
          message_id: reply.id.clone(),
          error: err.to_string(),
        }));
        None
      }
    }
  }

  // The remote thread is authoritative; a failed mirror write only loses
  // local history.
  async fn mirror(&self, thread_id: &ThreadId, message: &ChatMessage) {
    if let Err(err) = self.session.store().append_message(thread_id, message).await {
      warn!(thread_id = %thread_id, error = %err, "failed to store message");
    }
  }
}
