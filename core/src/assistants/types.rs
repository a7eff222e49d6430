//! Wire types for the Assistants REST API

use serde::{Deserialize, Serialize};

use ava_protocol::{ChatMessage, MessageRole, RunStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadObject {
  pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunObject {
  pub id: String,
  pub status: RunStatus,
  #[serde(default)]
  pub last_error: Option<RunError>,
}

impl RunObject {
  pub fn failure_reason(&self) -> Option<String> {
    self.last_error.as_ref().map(|e| match &e.code {
      Some(code) => format!("{code}: {}", e.message),
      None => e.message.clone(),
    })
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
  #[serde(default)]
  pub code: Option<String>,
  pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageObject {
  pub id: String,
  pub role: MessageRole,
  #[serde(default)]
  pub content: Vec<ContentBlock>,
  #[serde(default)]
  pub run_id: Option<String>,
}

impl MessageObject {
  /// Text blocks joined by newlines; `None` when there is no text at all
  pub fn text(&self) -> Option<String> {
    let parts: Vec<&str> = self
      .content
      .iter()
      .filter_map(|block| match block {
        ContentBlock::Text { text } => Some(text.value.as_str()),
        ContentBlock::Other => None,
      })
      .filter(|value| !value.is_empty())
      .collect();
    if parts.is_empty() {
      None
    } else {
      Some(parts.join("\n"))
    }
  }

  pub fn to_chat_message(&self) -> Option<ChatMessage> {
    Some(ChatMessage {
      id: self.id.clone(),
      role: self.role,
      content: self.text()?,
    })
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
  Text { text: TextContent },
  #[serde(other)]
  Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
  pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
  pub data: Vec<MessageObject>,
  #[serde(default)]
  pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateMessageRequest<'a> {
  pub role: &'static str,
  pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRunRequest<'a> {
  pub assistant_id: &'a str,
}
