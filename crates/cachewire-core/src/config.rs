//! Broker configuration.

use crate::error::{BrokerError, BrokerResult};
use crate::origin::Origin;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log output format for the serving process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(BrokerError::config(format!("unknown log format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Scope URL of the client; the broker serves this URL's origin.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Bound of the inbound envelope queue.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,

    /// Cache names created before serving starts.
    #[serde(default)]
    pub preload: Vec<String>,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_scope() -> String {
    "http://localhost/".to_string()
}

fn default_inbound_capacity() -> usize {
    256
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            inbound_capacity: default_inbound_capacity(),
            preload: Vec::new(),
            log_format: LogFormat::default(),
        }
    }
}

impl BrokerConfig {
    /// Load a YAML config file.
    pub fn from_path(path: &Path) -> BrokerResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|e| {
            BrokerError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `CACHEWIRE_SCOPE` | Client scope URL |
    /// | `CACHEWIRE_INBOUND_CAPACITY` | Inbound queue bound |
    /// | `CACHEWIRE_PRELOAD` | Comma-separated cache names to create up front |
    /// | `CACHEWIRE_LOG_FORMAT` | `text` or `json` |
    pub fn from_env() -> BrokerResult<Self> {
        let mut config = Self::default();
        if let Ok(scope) = std::env::var("CACHEWIRE_SCOPE") {
            config.scope = scope;
        }
        if let Ok(capacity) = std::env::var("CACHEWIRE_INBOUND_CAPACITY") {
            config.inbound_capacity = capacity.trim().parse().map_err(|_| {
                BrokerError::config(format!("invalid CACHEWIRE_INBOUND_CAPACITY '{}'", capacity))
            })?;
        }
        if let Ok(preload) = std::env::var("CACHEWIRE_PRELOAD") {
            config.preload = preload
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(format) = std::env::var("CACHEWIRE_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BrokerResult<()> {
        if self.inbound_capacity == 0 {
            return Err(BrokerError::config("inbound_capacity must be at least 1"));
        }
        if let Some(name) = self.preload.iter().find(|n| n.is_empty()) {
            return Err(BrokerError::config(format!(
                "preload contains an empty cache name: {:?}",
                name
            )));
        }
        self.origin()?;
        Ok(())
    }

    pub fn origin(&self) -> BrokerResult<Origin> {
        Origin::from_scope(&self.scope)
    }
}
