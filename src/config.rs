use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "CODEOPS_CONFIG";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("{var} is not a number: {value}")]
  NotANumber { var: &'static str, value: String },

  #[error("ollama_timeout_secs must be a positive number of seconds, got {0}")]
  InvalidTimeout(f64),

  #[error("{0} must not be empty")]
  Empty(&'static str),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
  pub bind_addr: String,
  pub ollama_base_url: String,
  pub ollama_model: String,
  pub ollama_timeout_secs: f64,
  pub log_path: Option<String>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      bind_addr: "127.0.0.1:8000".to_string(),
      ollama_base_url: "http://localhost:11434".to_string(),
      ollama_model: "deepseek-r1:32b".to_string(),
      ollama_timeout_secs: 180.0,
      log_path: None,
    }
  }
}

impl AppConfig {
  /// Applies `OLLAMA_*` / `CODEOPS_*` overrides from `lookup` on top of the current values.
  pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(url) = lookup("OLLAMA_BASE_URL") {
      self.ollama_base_url = url;
    }
    if let Some(model) = lookup("OLLAMA_MODEL") {
      self.ollama_model = model;
    }
    if let Some(raw) = lookup("OLLAMA_TIMEOUT") {
      self.ollama_timeout_secs = raw.trim().parse().map_err(|_| ConfigError::NotANumber {
        var: "OLLAMA_TIMEOUT",
        value: raw.clone(),
      })?;
    }
    if let Some(addr) = lookup("CODEOPS_BIND") {
      self.bind_addr = addr;
    }
    if let Some(path) = lookup("CODEOPS_LOG") {
      self.log_path = Some(path).filter(|p| !p.trim().is_empty());
    }
    Ok(())
  }

  pub fn gateway(&self) -> Result<GatewayConfig, ConfigError> {
    let base = self.ollama_base_url.trim().trim_end_matches('/');
    if base.is_empty() {
      return Err(ConfigError::Empty("ollama_base_url"));
    }
    if self.ollama_model.trim().is_empty() {
      return Err(ConfigError::Empty("ollama_model"));
    }
    let secs = self.ollama_timeout_secs;
    if secs <= 0.0 {
      return Err(ConfigError::InvalidTimeout(secs));
    }
    // NaN, infinity and values past Duration::MAX all fail here.
    let timeout = Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidTimeout(secs))?;
    Ok(GatewayConfig {
      chat_url: format!("{base}/api/chat"),
      model: self.ollama_model.trim().to_string(),
      timeout,
    })
  }
}

/// Immutable backend settings handed to `OllamaClient::new`.
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayConfig {
  pub chat_url: String,
  pub model: String,
  pub timeout: Duration,
}

pub fn load_or_init(path: &Path) -> anyhow::Result<AppConfig> {
  if path.exists() {
    let data = std::fs::read_to_string(path)
      .with_context(|| format!("reading config {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&data)
      .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
  } else {
    let config = AppConfig::default();
    save_config(path, &config)?;
    Ok(config)
  }
}

fn save_config(path: &Path, config: &AppConfig) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(config)?;
  std::fs::write(path, json).with_context(|| format!("writing config {}", path.display()))?;
  Ok(())
}

/// Startup-time configuration: optional file named by `CODEOPS_CONFIG`, then environment.
pub fn from_env() -> anyhow::Result<AppConfig> {
  load_with(|key| std::env::var(key).ok())
}

fn load_with<F>(lookup: F) -> anyhow::Result<AppConfig>
where
  F: Fn(&str) -> Option<String>,
{
  let mut config = match lookup(CONFIG_PATH_VAR) {
    Some(path) if !path.trim().is_empty() => load_or_init(Path::new(path.trim()))?,
    _ => AppConfig::default(),
  };
  config.apply_overrides(lookup)?;
  config.gateway()?;
  Ok(config)
}
