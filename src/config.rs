use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::Content;
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  pub retry: RetryConfig,
  pub cache: CacheConfig,
  pub offline: OfflineConfig,
  /// Replaces the built-in synthetic table when set
  #[serde(default)]
  pub synthetic: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  pub url: String,
  /// Upper bound for a single attempt
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
  10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineConfig {
  /// Database file (defaults to $XDG_DATA_HOME/steadyfetch/offline.db)
  pub path: Option<PathBuf>,
  /// Fetched items older than this are pruned at startup
  pub prune_after_days: u32,
  /// YAML seed bundle loaded on first run
  pub bundle: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./steadyfetch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/steadyfetch/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/steadyfetch/config.yaml\n\
                 See steadyfetch.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("steadyfetch.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("steadyfetch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Parse and validate YAML configuration.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.capacity == 0 {
      return Err(eyre!("cache.capacity must be at least 1"));
    }
    if self.remote.timeout_ms == 0 {
      return Err(eyre!("remote.timeout_ms must be greater than 0"));
    }
    if let Some(entries) = &self.synthetic {
      if !entries.iter().any(|e| e.is_well_formed()) {
        return Err(eyre!(
          "synthetic must contain at least one non-empty entry, or be left out to use the built-in table"
        ));
      }
    }
    Ok(())
  }

  /// Get the API token from the environment, if one is set.
  ///
  /// Checks STEADYFETCH_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("STEADYFETCH_API_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  const EXAMPLE: &str = r#"
remote:
  url: https://content.example.com/v1/generate
retry:
  max_attempts: 3
  initial_delay_ms: 1000
  backoff_multiplier: 2.0
  max_delay_ms: 16000
cache:
  capacity: 50
offline:
  prune_after_days: 30
"#;

  #[test]
  fn test_parse_example() {
    let config = Config::parse(EXAMPLE).unwrap();
    assert_eq!(config.retry.max_attempts(), 3);
    assert_eq!(config.retry.initial_delay(), Duration::from_millis(1000));
    assert_eq!(config.cache.capacity, 50);
    assert_eq!(config.offline.prune_after_days, 30);
    assert_eq!(config.remote.timeout_ms, 10_000);
    assert!(config.offline.path.is_none());
    assert!(config.synthetic.is_none());
  }

  #[test]
  fn test_retry_fields_are_required() {
    let without_max_delay = EXAMPLE.replace("  max_delay_ms: 16000\n", "");
    assert!(Config::parse(&without_max_delay).is_err());
  }

  #[test]
  fn test_rejects_zero_capacity() {
    let zero = EXAMPLE.replace("capacity: 50", "capacity: 0");
    let err = Config::parse(&zero).unwrap_err();
    assert!(err.to_string().contains("cache.capacity"));
  }

  #[test]
  fn test_rejects_empty_synthetic_table() {
    let empty = format!("{}synthetic: []\n", EXAMPLE);
    let err = Config::parse(&empty).unwrap_err();
    assert!(err.to_string().contains("synthetic"));
  }

  #[test]
  fn test_rejects_synthetic_table_without_usable_entries() {
    let unusable = format!("{}synthetic:\n  - null\n  - ''\n  - {{}}\n", EXAMPLE);
    assert!(Config::parse(&unusable).is_err());

    let one_good = format!("{}synthetic:\n  - null\n  - title: Hello\n", EXAMPLE);
    assert!(Config::parse(&one_good).is_ok());
  }

  #[test]
  fn test_rejects_bad_multiplier() {
    let bad = EXAMPLE.replace("backoff_multiplier: 2.0", "backoff_multiplier: 0.5");
    assert!(Config::parse(&bad).is_err());
  }

  #[test]
  fn test_synthetic_override() {
    let with_synthetic = format!("{}synthetic:\n  - title: Hello\n    body: World\n", EXAMPLE);
    let config = Config::parse(&with_synthetic).unwrap();
    assert_eq!(config.synthetic.unwrap().len(), 1);
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/steadyfetch.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
