// Ava Configuration System
// Layered configuration management

pub mod types;
pub mod loader;
pub mod layered;

use std::path::PathBuf;

pub use types::*;
pub use loader::{ConfigLoader, parse_override};
pub use layered::{ConfigLayer, ConfigLayerSource, LayeredConfig};

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid configuration: {0}")]
  Deserialize(#[from] toml::de::Error),

  #[error("failed to serialize configuration: {0}")]
  Serialize(#[from] toml::ser::Error),

  #[error("invalid override `{0}`, expected KEY=VALUE")]
  InvalidOverride(String),

  #[error("invalid configuration: {0}")]
  Invalid(String),

  #[error("missing configuration value: {0}")]
  MissingValue(&'static str),

  #[error("environment variable {0} is not set")]
  MissingSecret(String),
}
