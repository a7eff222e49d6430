//! Error types for the assistant and avatar layers

use ava_protocol::{RunStatus, TalkStatus};
use thiserror::Error;

/// Errors raised while orchestrating a turn
#[derive(Error, Debug)]
pub enum AvaError {
  /// Remote API answered with a non-success status
  #[error("HTTP {status}: {body}")]
  Http { status: u16, body: String },

  /// Network error
  #[error("Network error: {0}")]
  Network(#[from] reqwest::Error),

  /// JSON parse error
  #[error("JSON parse error: {0}")]
  Json(#[from] serde_json::Error),

  /// Run reached a terminal status other than `completed`
  #[error("Run {run_id} ended as {status}{}", reason_suffix(.reason))]
  RunFailed {
    run_id: String,
    status: RunStatus,
    reason: Option<String>,
  },

  /// Talk reached a terminal status other than `done`
  #[error("Talk {talk_id} ended as {status}{}", reason_suffix(.reason))]
  TalkFailed {
    talk_id: String,
    status: TalkStatus,
    reason: Option<String>,
  },

  /// Run completed but the thread holds no assistant text
  #[error("No assistant reply found on thread {thread_id}")]
  MissingAssistantReply { thread_id: String },

  /// Response parsed but lacks something it must carry
  #[error("Malformed response: {0}")]
  MalformedResponse(String),

  /// Poll attempts ran out before a terminal status
  #[error("{what} did not finish after {attempts} status checks")]
  PollExhausted { what: String, attempts: u32 },

  /// Cancelled through a cancellation token
  #[error("Cancelled")]
  Cancelled,

  /// Empty or whitespace-only user input
  #[error("Message is empty")]
  EmptyInput,

  /// Configuration error
  #[error("Configuration error: {0}")]
  Config(#[from] ava_config::ConfigError),

  /// Session store error
  #[error("Session store error: {0}")]
  Store(#[from] ava_state::StateError),
}

impl From<ava_cancel::Cancelled> for AvaError {
  fn from(_: ava_cancel::Cancelled) -> Self {
    AvaError::Cancelled
  }
}

fn reason_suffix(reason: &Option<String>) -> String {
  reason
    .as_deref()
    .map(|r| format!(": {r}"))
    .unwrap_or_default()
}

/// Alias for Result<T, AvaError>
pub type Result<T> = std::result::Result<T, AvaError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn run_failure_message_includes_reason() {
    let err = AvaError::RunFailed {
      run_id: "run_1".to_string(),
      status: RunStatus::Failed,
      reason: Some("rate_limit_exceeded".to_string()),
    };
    assert_eq!(err.to_string(), "Run run_1 ended as failed: rate_limit_exceeded");

    let err = AvaError::RunFailed {
      run_id: "run_2".to_string(),
      status: RunStatus::Expired,
      reason: None,
    };
    assert_eq!(err.to_string(), "Run run_2 ended as expired");
  }
}
