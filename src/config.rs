//! Configuration types for the orchestration core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatonConfig {
    /// Job scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Completion provider settings.
    pub provider: ProviderConfig,
    /// Relay workflow settings.
    pub relay: RelayConfig,
}

/// Job scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between evaluation passes over the job store.
    ///
    /// This is also the re-fire suppression window: a job that ran at T
    /// will not run again before T + poll_interval_secs.
    pub poll_interval_secs: u64,
    /// Path of the job store document (None = `config_dir()/jobs.json`).
    pub store_path: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            store_path: None,
        }
    }
}

impl SchedulerConfig {
    /// Resolved job store path.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| config_dir().join("jobs.json"))
    }
}

/// Relay workflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Directory of extra workflow JSON files merged over the stock
    /// catalog at startup (None = `config_dir()/workflows`).
    pub workflow_dir: Option<PathBuf>,
}

impl RelayConfig {
    /// Resolved workflow directory.
    #[must_use]
    pub fn workflow_dir(&self) -> PathBuf {
        self.workflow_dir
            .clone()
            .unwrap_or_else(|| config_dir().join("workflows"))
    }
}

/// Completion provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Chat completions endpoint (OpenAI-compatible JSON API).
    pub api_url: String,
    /// Bearer token for the endpoint (None = anonymous).
    pub api_key: Option<String>,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Whole-request timeout in seconds.
    ///
    /// A timed-out request is classified like a rate limit so the fallback
    /// loop moves to the next provider instead of retrying a dead one.
    pub request_timeout_secs: u64,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Completion attempt budget for the fallback loop.
    pub max_attempts: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://openrouter.ai/api/v1/chat/completions".to_owned(),
            api_key: None,
            max_tokens: 1200,
            temperature: 0.6,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_attempts: 3,
        }
    }
}

impl BatonConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::BatonError::Config(e.to_string()))
    }

    /// Load configuration from the default path, using defaults when the file
    /// is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> crate::error::Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::BatonError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/baton/` by default. Override with the
/// `BATON_CONFIG_DIR` environment variable (useful in tests and custom
/// deployments).
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("BATON_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("baton"))
        .unwrap_or_else(|| PathBuf::from("/tmp/baton-config"))
}

/// Default config file path (`config_dir()/config.toml`).
#[must_use]
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}
