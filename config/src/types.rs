// Configuration Types
// All configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ConfigError;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// Assistants API settings
  pub openai: OpenAiConfig,
  /// Talking-head avatar settings
  pub avatar: AvatarConfig,
  /// Poll schedules for runs and talks
  pub polling: PollingConfig,
  /// Realtime relay settings
  pub relay: RelayConfig,
  /// Session persistence
  pub storage: StorageConfig,
  /// Shared HTTP client settings
  pub http: HttpConfig,
}

// ============================================================================
// OPENAI ASSISTANTS
// ============================================================================

/// Assistants API configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAiConfig {
  /// API base URL
  pub base_url: String,
  /// Value of the `OpenAI-Beta` header, one version for every call
  pub beta_version: String,
  /// Assistant that runs against each thread
  pub assistant_id: Option<String>,
  /// Environment variable holding the API key
  pub api_key_env: String,
  /// Optional organization header
  pub organization: Option<String>,
  /// How many recent messages to fetch when extracting a reply
  pub message_limit: u32,
}

impl Default for OpenAiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.openai.com/v1".to_string(),
      beta_version: "assistants=v2".to_string(),
      assistant_id: None,
      api_key_env: "OPENAI_API_KEY".to_string(),
      organization: None,
      message_limit: 20,
    }
  }
}

impl OpenAiConfig {
  /// Assistant id from config, falling back to `AVA_ASSISTANT_ID`.
  pub fn resolve_assistant_id(&self) -> Result<String, ConfigError> {
    self
      .assistant_id
      .clone()
      .filter(|id| !id.trim().is_empty())
      .or_else(|| std::env::var("AVA_ASSISTANT_ID").ok())
      .ok_or(ConfigError::MissingValue("openai.assistant_id"))
  }

  pub fn api_key(&self) -> Result<String, ConfigError> {
    secret_from_env(&self.api_key_env)
  }
}

// ============================================================================
// AVATAR
// ============================================================================

/// Talking-head avatar configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvatarConfig {
  /// Animate assistant replies by default
  pub enabled: bool,
  /// Talks API base URL
  pub base_url: String,
  /// Portrait image the avatar is rendered from
  pub source_url: String,
  /// Environment variable holding the Basic auth key
  pub api_key_env: String,
  /// Optional text-to-speech voice
  pub voice_id: Option<String>,
}

impl Default for AvatarConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      base_url: "https://api.d-id.com".to_string(),
      source_url: "https://create-images-results.d-id.com/DefaultPresenters/Noelle_f/image.jpeg"
        .to_string(),
      api_key_env: "DID_API_KEY".to_string(),
      voice_id: None,
    }
  }
}

impl AvatarConfig {
  pub fn api_key(&self) -> Result<String, ConfigError> {
    secret_from_env(&self.api_key_env)
  }
}

// ============================================================================
// POLLING
// ============================================================================

/// Poll schedules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
  pub run: PollSettings,
  pub talk: PollSettings,
}

/// Largest accepted backoff growth factor
pub const MAX_POLL_MULTIPLIER: f64 = 10.0;

/// Exponential backoff schedule with an attempts ceiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
  /// Wait before the first status check
  pub initial_interval_ms: u64,
  /// Growth factor applied after every non-terminal check
  pub multiplier: f64,
  /// Upper bound for a single wait
  pub max_interval_ms: u64,
  /// Status checks before giving up
  pub max_attempts: u32,
}

impl Default for PollSettings {
  fn default() -> Self {
    Self {
      initial_interval_ms: 1000,
      multiplier: 1.5,
      max_interval_ms: 8000,
      max_attempts: 60,
    }
  }
}

impl PollSettings {
  pub fn initial_interval(&self) -> Duration {
    Duration::from_millis(self.initial_interval_ms)
  }

  pub fn max_interval(&self) -> Duration {
    Duration::from_millis(self.max_interval_ms)
  }

  pub fn validate(&self, section: &str) -> Result<(), ConfigError> {
    if self.max_attempts == 0 {
      return Err(ConfigError::Invalid(format!(
        "{section}.max_attempts must be at least 1"
      )));
    }
    if self.initial_interval_ms == 0 {
      return Err(ConfigError::Invalid(format!(
        "{section}.initial_interval_ms must be at least 1"
      )));
    }
    if !(1.0..=MAX_POLL_MULTIPLIER).contains(&self.multiplier) {
      return Err(ConfigError::Invalid(format!(
        "{section}.multiplier must be between 1.0 and {MAX_POLL_MULTIPLIER}"
      )));
    }
    if self.max_interval_ms < self.initial_interval_ms {
      return Err(ConfigError::Invalid(format!(
        "{section}.max_interval_ms must not be below initial_interval_ms"
      )));
    }
    Ok(())
  }
}

// ============================================================================
// REALTIME RELAY
// ============================================================================

/// Realtime relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
  /// Address the relay listens on
  pub listen: String,
  /// Upstream realtime endpoint, without query string
  pub upstream_url: String,
  /// Realtime model appended as `?model=`
  pub model: String,
  /// Instructions sent in the injected `session.update`
  pub instructions: String,
  /// Environment variable holding the upstream API key
  pub api_key_env: String,
}

impl Default for RelayConfig {
  fn default() -> Self {
    Self {
      listen: "127.0.0.1:8787".to_string(),
      upstream_url: "wss://api.openai.com/v1/realtime".to_string(),
      model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
      instructions: "You help families search for senior care facilities. \
        When the user describes what they need, call update_map_filters with \
        the location, care types, budget and amenities they mention."
        .to_string(),
      api_key_env: "OPENAI_API_KEY".to_string(),
    }
  }
}

impl RelayConfig {
  pub fn upstream_endpoint(&self) -> String {
    format!("{}?model={}", self.upstream_url.trim_end_matches('/'), self.model)
  }

  pub fn api_key(&self) -> Result<String, ConfigError> {
    secret_from_env(&self.api_key_env)
  }
}

// ============================================================================
// STORAGE
// ============================================================================

/// Session storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
  pub backend: StorageBackend,
  /// File or database path; defaults under `~/.ava`
  pub path: Option<PathBuf>,
  /// Slot the thread id is stored under
  pub session_key: String,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      backend: StorageBackend::File,
      path: None,
      session_key: "default".to_string(),
    }
  }
}

impl StorageConfig {
  /// Configured path, or the backend's default file in `home`.
  pub fn resolved_path(&self, home: &std::path::Path) -> PathBuf {
    if let Some(path) = &self.path {
      return path.clone();
    }
    match self.backend {
      StorageBackend::Sqlite => home.join("state.sqlite"),
      _ => home.join("session.json"),
    }
  }
}

/// Storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
  Memory,
  File,
  Sqlite,
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
  /// Per-request timeout
  pub timeout_secs: u64,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self { timeout_secs: 60 }
  }
}

impl Config {
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.polling.run.validate("polling.run")?;
    self.polling.talk.validate("polling.talk")?;
    if self.openai.message_limit == 0 || self.openai.message_limit > 100 {
      return Err(ConfigError::Invalid(
        "openai.message_limit must be between 1 and 100".to_string(),
      ));
    }
    Ok(())
  }
}

fn secret_from_env(var: &str) -> Result<String, ConfigError> {
  std::env::var(var)
    .ok()
    .filter(|value| !value.trim().is_empty())
    .ok_or_else(|| ConfigError::MissingSecret(var.to_string()))
}
