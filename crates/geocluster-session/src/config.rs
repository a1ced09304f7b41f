//! Session and worker configuration.
//!
//! ```toml
//! debounce_ms = 30
//! result_buffer = 4
//!
//! [engine]
//! max_clusters_default = 500
//!
//! [engine.grid]
//! max_cells = 50000
//! ```

use std::path::Path;
use std::time::Duration;

use geocluster_core::{ConfigError, ConfigResult, EngineConfig};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DEBOUNCE_MS: u64 = 30;
pub const DEFAULT_RESULT_BUFFER: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub engine: EngineConfig,
    /// Requests arriving within this window of each other coalesce.
    pub debounce_ms: u64,
    /// Results held for a slow consumer before the worker waits.
    pub result_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            result_buffer: DEFAULT_RESULT_BUFFER,
        }
    }
}

impl SessionConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SessionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.engine.validate()?;
        if self.result_buffer == 0 {
            return Err(ConfigError::Invalid("result_buffer must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
