//! Assistants API client
//!
//! Threads, messages and runs over REST, plus the run-to-reply flow that
//! ties them together.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde_json::json;
use tracing::{debug, info, warn};

use ava_cancel::CancellationToken;
use ava_config::Config;
use ava_protocol::{ChatMessage, MessageRole, ThreadId};

use super::types::{
  CreateMessageRequest, CreateRunRequest, MessageList, MessageObject, RunObject, ThreadObject,
};
use crate::error::{AvaError, Result};
use crate::http::{create_client, join_url, read_json};
use crate::poll::{PollPolicy, poll_until};

/// Ceiling for the best-effort cancel call issued after a local cancel
const CANCEL_RUN_TIMEOUT: Duration = Duration::from_secs(5);

/// Assistants API client
#[derive(Clone)]
pub struct AssistantsClient {
  client: Client,
  base_url: String,
  api_key: String,
  beta_version: String,
  organization: Option<String>,
}

impl AssistantsClient {
  /// Create a client against `base_url`
  pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
    Ok(Self {
      client: create_client(60)?,
      base_url: base_url.into(),
      api_key: api_key.into(),
      beta_version: "assistants=v2".to_string(),
      organization: None,
    })
  }

  /// Build from configuration; the key comes from the configured env var
  pub fn from_config(config: &Config) -> Result<Self> {
    let openai = &config.openai;
    Ok(Self {
      client: create_client(config.http.timeout_secs)?,
      base_url: openai.base_url.clone(),
      api_key: openai.api_key()?,
      beta_version: openai.beta_version.clone(),
      organization: openai.organization.clone(),
    })
  }

  pub fn with_beta_version(mut self, beta_version: impl Into<String>) -> Self {
    self.beta_version = beta_version.into();
    self
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let builder = self
      .client
      .request(method, join_url(&self.base_url, path))
      .bearer_auth(&self.api_key)
      .header("OpenAI-Beta", &self.beta_version);
    match &self.organization {
      Some(org) => builder.header("OpenAI-Organization", org),
      None => builder,
    }
  }

  /// Create an empty thread
  pub async fn create_thread(&self) -> Result<ThreadId> {
    let response = self
      .request(Method::POST, "threads")
      .json(&json!({}))
      .send()
      .await?;
    let thread: ThreadObject = read_json(response).await?;
    info!(thread_id = %thread.id, "created assistant thread");
    Ok(ThreadId::new(thread.id))
  }

  /// Append a user message to a thread
  pub async fn add_message(&self, thread_id: &ThreadId, content: &str) -> Result<MessageObject> {
    let response = self
      .request(Method::POST, &format!("threads/{thread_id}/messages"))
      .json(&CreateMessageRequest {
        role: MessageRole::User.as_str(),
        content,
      })
      .send()
      .await?;
    read_json(response).await
  }

  /// Start a run of `assistant_id` over the thread
  pub async fn create_run(&self, thread_id: &ThreadId, assistant_id: &str) -> Result<RunObject> {
    let response = self
      .request(Method::POST, &format!("threads/{thread_id}/runs"))
      .json(&CreateRunRequest { assistant_id })
      .send()
      .await?;
    let run: RunObject = read_json(response).await?;
    debug!(run_id = %run.id, status = %run.status, "created run");
    Ok(run)
  }

  pub async fn retrieve_run(&self, thread_id: &ThreadId, run_id: &str) -> Result<RunObject> {
    let response = self
      .request(Method::GET, &format!("threads/{thread_id}/runs/{run_id}"))
      .send()
      .await?;
    read_json(response).await
  }

  pub async fn cancel_run(&self, thread_id: &ThreadId, run_id: &str) -> Result<RunObject> {
    let response = self
      .request(Method::POST, &format!("threads/{thread_id}/runs/{run_id}/cancel"))
      .send()
      .await?;
    read_json(response).await
  }

  /// Most recent messages, newest first as the API returns them
  pub async fn list_messages(
    &self,
    thread_id: &ThreadId,
    limit: u32,
  ) -> Result<Vec<MessageObject>> {
    let limit = limit.to_string();
    let response = self
      .request(Method::GET, &format!("threads/{thread_id}/messages"))
      .query(&[("order", "desc"), ("limit", limit.as_str())])
      .send()
      .await?;
    let list: MessageList = read_json(response).await?;
    Ok(list.data)
  }

  /// Recent messages with text, oldest first
  pub async fn history(&self, thread_id: &ThreadId, limit: u32) -> Result<Vec<ChatMessage>> {
    let mut messages: Vec<ChatMessage> = self
      .list_messages(thread_id, limit)
      .await?
      .iter()
      .filter_map(MessageObject::to_chat_message)
      .collect();
    messages.reverse();
    Ok(messages)
  }

  /// Poll a run until it reaches a terminal status
  pub async fn wait_for_run(
    &self,
    thread_id: &ThreadId,
    run_id: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
  ) -> Result<RunObject> {
    poll_until(
      policy,
      cancel,
      &format!("run {run_id}"),
      || self.retrieve_run(thread_id, run_id),
      |run| run.status.is_terminal(),
    )
    .await
  }

  /// Newest assistant message with text. When `run_id` is given, messages
  /// attributed to a different run are skipped.
  pub async fn latest_assistant_reply(
    &self,
    thread_id: &ThreadId,
    limit: u32,
    run_id: Option<&str>,
  ) -> Result<ChatMessage> {
    let messages = self.list_messages(thread_id, limit).await?;
    messages
      .iter()
      .filter(|m| m.role == MessageRole::Assistant)
      .filter(|m| match (run_id, m.run_id.as_deref()) {
        (Some(wanted), Some(actual)) => wanted == actual,
        _ => true,
      })
      .find_map(MessageObject::to_chat_message)
      .ok_or_else(|| AvaError::MissingAssistantReply {
        thread_id: thread_id.to_string(),
      })
  }

  /// Post `content`, run the assistant and return its reply.
  ///
  /// A non-`completed` terminal status becomes [`AvaError::RunFailed`].
  /// On cancellation the remote run is cancelled on a best-effort basis.
  pub async fn ask(
    &self,
    thread_id: &ThreadId,
    assistant_id: &str,
    content: &str,
    policy: &PollPolicy,
    message_limit: u32,
    cancel: &CancellationToken,
  ) -> Result<ChatMessage> {
    self.add_message(thread_id, content).await?;
    let run = self.create_run(thread_id, assistant_id).await?;

    let run = match self.wait_for_run(thread_id, &run.id, policy, cancel).await {
      Ok(run) => run,
      Err(AvaError::Cancelled) => {
        self.cancel_run_quietly(thread_id, &run.id).await;
        return Err(AvaError::Cancelled);
      }
      Err(err) => return Err(err),
    };

    if !run.status.is_success() {
      return Err(AvaError::RunFailed {
        reason: run.failure_reason(),
        run_id: run.id,
        status: run.status,
      });
    }

    self
      .latest_assistant_reply(thread_id, message_limit, Some(&run.id))
      .await
  }

  async fn cancel_run_quietly(&self, thread_id: &ThreadId, run_id: &str) {
    match tokio::time::timeout(CANCEL_RUN_TIMEOUT, self.cancel_run(thread_id, run_id)).await {
      Ok(Ok(run)) => info!(run_id, status = %run.status, "cancelled run"),
      Ok(Err(err)) => warn!(run_id, error = %err, "failed to cancel run"),
      Err(_) => warn!(run_id, "timed out cancelling run"),
    }
  }
}
