// Layered Configuration
// Support for layered configuration with precedence

use toml::{Table, Value};

/// Layered configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
  /// Configuration layers, lowest precedence first
  layers: Vec<ConfigLayer>,
}

/// Configuration layer with source tracking
#[derive(Debug, Clone)]
pub struct ConfigLayer {
  /// Layer source
  pub source: ConfigLayerSource,
  /// Configuration values
  pub values: Table,
}

/// Configuration layer source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayerSource {
  /// Built-in defaults
  Default,
  /// Global user config
  GlobalConfig,
  /// Project-specific config
  ProjectConfig,
  /// CLI override
  CliOverride,
}

impl LayeredConfig {
  /// Create a new layered configuration
  pub fn new() -> Self {
    Self { layers: Vec::new() }
  }

  /// Add a layer on top of the existing ones
  pub fn add_layer(&mut self, source: ConfigLayerSource, values: Table) {
    self.layers.push(ConfigLayer { source, values });
  }

  pub fn sources(&self) -> impl Iterator<Item = &ConfigLayerSource> {
    self.layers.iter().map(|layer| &layer.source)
  }

  /// Get merged configuration. Tables merge key by key; any other value
  /// from a later layer replaces the earlier one.
  pub fn merge(&self) -> Table {
    let mut merged = Table::new();
    for layer in &self.layers {
      merge_tables(&mut merged, &layer.values);
    }
    merged
  }
}

fn merge_tables(base: &mut Table, overlay: &Table) {
  for (key, value) in overlay {
    if let (Some(Value::Table(existing)), Value::Table(incoming)) = (base.get_mut(key), value) {
      merge_tables(existing, incoming);
      continue;
    }
    base.insert(key.clone(), value.clone());
  }
}

/// Build a nested table holding `value` at dotted `key`.
pub(crate) fn table_for_dotted_key(key: &str, value: Value) -> Table {
  let mut parts: Vec<&str> = key.split('.').collect();
  let last = parts.pop().unwrap_or_default();
  let mut table = Table::new();
  table.insert(last.to_string(), value);
  for part in parts.into_iter().rev() {
    let mut parent = Table::new();
    parent.insert(part.to_string(), Value::Table(table));
    table = parent;
  }
  table
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn table(src: &str) -> Table {
    toml::from_str::<Table>(src).expect("valid toml")
  }

  #[test]
  fn later_layers_override_nested_keys_only() {
    let mut layered = LayeredConfig::new();
    layered.add_layer(
      ConfigLayerSource::Default,
      table("[openai]\nbase_url = \"a\"\nmessage_limit = 20\n"),
    );
    layered.add_layer(ConfigLayerSource::GlobalConfig, table("[openai]\nmessage_limit = 5\n"));

    let merged = layered.merge();
    assert_eq!(merged["openai"]["base_url"].as_str(), Some("a"));
    assert_eq!(merged["openai"]["message_limit"].as_integer(), Some(5));
  }

  #[test]
  fn dotted_key_builds_nested_tables() {
    let t = table_for_dotted_key("polling.run.max_attempts", Value::Integer(3));
    assert_eq!(t, table("[polling.run]\nmax_attempts = 3\n"));
  }

  #[test]
  fn tracks_layer_order() {
    let mut layered = LayeredConfig::new();
    layered.add_layer(ConfigLayerSource::Default, Table::new());
    layered.add_layer(ConfigLayerSource::CliOverride, Table::new());
    let sources: Vec<_> = layered.sources().cloned().collect();
    assert_eq!(
      sources,
      vec![ConfigLayerSource::Default, ConfigLayerSource::CliOverride]
    );
  }
}
