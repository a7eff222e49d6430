use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-side conversation identifier for the Assistants API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ThreadId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<String> for ThreadId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

impl From<&str> for ThreadId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
  User,
  Assistant,
}

impl MessageRole {
  pub fn as_str(&self) -> &'static str {
    match self {
      MessageRole::User => "user",
      MessageRole::Assistant => "assistant",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "user" => Some(MessageRole::User),
      "assistant" => Some(MessageRole::Assistant),
      _ => None,
    }
  }
}

/// One entry of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub id: String,
  pub role: MessageRole,
  pub content: String,
}

impl ChatMessage {
  /// User message with a locally generated id.
  pub fn user(content: impl Into<String>) -> Self {
    Self {
      id: format!("local_{}", uuid::Uuid::new_v4().simple()),
      role: MessageRole::User,
      content: content.into(),
    }
  }

  pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      role: MessageRole::Assistant,
      content: content.into(),
    }
  }
}

/// Status of an assistant run, as reported by the Assistants API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Queued,
  InProgress,
  RequiresAction,
  Cancelling,
  Cancelled,
  Failed,
  Completed,
  Incomplete,
  Expired,
}

impl RunStatus {
  /// No further status transitions will happen.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      RunStatus::Cancelled
        | RunStatus::Failed
        | RunStatus::Completed
        | RunStatus::Incomplete
        | RunStatus::Expired
    )
  }

  pub fn is_success(&self) -> bool {
    matches!(self, RunStatus::Completed)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      RunStatus::Queued => "queued",
      RunStatus::InProgress => "in_progress",
      RunStatus::RequiresAction => "requires_action",
      RunStatus::Cancelling => "cancelling",
      RunStatus::Cancelled => "cancelled",
      RunStatus::Failed => "failed",
      RunStatus::Completed => "completed",
      RunStatus::Incomplete => "incomplete",
      RunStatus::Expired => "expired",
    }
  }
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Status of a talking-head render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TalkStatus {
  Created,
  Started,
  Done,
  Error,
  Rejected,
}

impl TalkStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, TalkStatus::Done | TalkStatus::Error | TalkStatus::Rejected)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      TalkStatus::Created => "created",
      TalkStatus::Started => "started",
      TalkStatus::Done => "done",
      TalkStatus::Error => "error",
      TalkStatus::Rejected => "rejected",
    }
  }
}

impl fmt::Display for TalkStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
