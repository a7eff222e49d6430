// Configuration Loader
// Layered configuration loading system

use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::debug;

use crate::ConfigError;
use crate::layered::{ConfigLayerSource, LayeredConfig, table_for_dotted_key};
use crate::types::Config;

/// Configuration loader with layered support
pub struct ConfigLoader {
  /// Global config directory
  global_dir: PathBuf,
  /// Project config directory
  project_dir: Option<PathBuf>,
}

impl ConfigLoader {
  /// Create a new configuration loader rooted at `~/.ava`
  pub fn new() -> Self {
    let global_dir = dirs::home_dir()
      .unwrap_or_else(|| PathBuf::from("."))
      .join(".ava");

    Self {
      global_dir,
      project_dir: None,
    }
  }

  /// Override the global config directory
  pub fn with_global_dir(mut self, dir: PathBuf) -> Self {
    self.global_dir = dir;
    self
  }

  /// Set project directory
  pub fn with_project_dir(mut self, dir: PathBuf) -> Self {
    self.project_dir = Some(dir);
    self
  }

  /// Directory holding the global config and default state files
  pub fn global_dir(&self) -> &Path {
    &self.global_dir
  }

  /// Load configuration with CLI overrides
  pub fn load_with_cli_overrides(
    &self,
    cli_overrides: Vec<(String, String)>,
  ) -> Result<Config, ConfigError> {
    // Layers in order:
    // 1. Built-in defaults
    // 2. Global config (~/.ava/config.toml)
    // 3. Project config (.ava/config.toml)
    // 4. CLI overrides
    let mut layered = LayeredConfig::new();
    if let Value::Table(defaults) = Value::try_from(Config::default())? {
      layered.add_layer(ConfigLayerSource::Default, defaults);
    }

    let global_path = self.global_dir.join("config.toml");
    if let Some(table) = read_table(&global_path)? {
      debug!(path = %global_path.display(), "loaded global config");
      layered.add_layer(ConfigLayerSource::GlobalConfig, table);
    }

    if let Some(project_dir) = &self.project_dir {
      let project_path = project_dir.join(".ava").join("config.toml");
      if let Some(table) = read_table(&project_path)? {
        debug!(path = %project_path.display(), "loaded project config");
        layered.add_layer(ConfigLayerSource::ProjectConfig, table);
      }
    }

    for (key, value) in cli_overrides {
      layered.add_layer(
        ConfigLayerSource::CliOverride,
        table_for_dotted_key(&key, parse_override_value(&value)),
      );
    }

    let config: Config = Value::Table(layered.merge()).try_into()?;
    config.validate()?;
    Ok(config)
  }

  /// Load configuration without overrides
  pub fn load(&self) -> Result<Config, ConfigError> {
    self.load_with_cli_overrides(Vec::new())
  }
}

impl Default for ConfigLoader {
  fn default() -> Self {
    Self::new()
  }
}

/// Split a `KEY=VALUE` CLI override
pub fn parse_override(raw: &str) -> Result<(String, String), ConfigError> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| ConfigError::InvalidOverride(raw.to_string()))?;
  let key = key.trim();
  if key.is_empty() || key.split('.').any(str::is_empty) {
    return Err(ConfigError::InvalidOverride(raw.to_string()));
  }
  Ok((key.to_string(), value.trim().to_string()))
}

/// Interpret an override as a TOML value, falling back to a bare string
fn parse_override_value(raw: &str) -> Value {
  toml::from_str::<Table>(&format!("value = {raw}"))
    .ok()
    .and_then(|mut table| table.remove("value"))
    .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn read_table(path: &Path) -> Result<Option<Table>, ConfigError> {
  if !path.exists() {
    return Ok(None);
  }
  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let table = toml::from_str::<Table>(&content).map_err(|source| ConfigError::Parse {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(Some(table))
}
