//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! max_clusters_default = 500
//!
//! [grid]
//! base_cell_degrees = 45.0
//! max_cells = 50000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Cell size at zoom 0, in degrees.
pub const DEFAULT_BASE_CELL_DEGREES: f64 = 45.0;
/// Deepest zoom level that still shrinks cells.
pub const DEFAULT_MAX_LEVEL: u32 = 20;
pub const DEFAULT_MAX_CELLS: usize = 50_000;
/// Finest cell size accepted. Anything smaller overflows the integer cell
/// key (`360 / 1e-9` is far below `i64::MAX`, `360 / 1e-18` is not).
pub const MIN_CELL_DEGREES_FLOOR: f64 = 1e-9;
pub const DEFAULT_REDUCE_INPUT_LIMIT: usize = 1_024;

/// Grid sizing knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Cell size at zoom 0 before clamping.
    pub base_cell_degrees: f64,
    /// Smallest cell size; stops cells shrinking at very high zoom.
    pub min_cell_degrees: f64,
    /// Largest cell size; prevents a single giant cell at zoom 0.
    pub max_cell_degrees: f64,
    /// Occupied-cell bound. Exceeding it coarsens the grid.
    pub max_cells: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            base_cell_degrees: DEFAULT_BASE_CELL_DEGREES,
            min_cell_degrees: DEFAULT_BASE_CELL_DEGREES / f64::from(1u32 << DEFAULT_MAX_LEVEL),
            max_cell_degrees: DEFAULT_BASE_CELL_DEGREES,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        let sizes = [
            ("base_cell_degrees", self.base_cell_degrees),
            ("min_cell_degrees", self.min_cell_degrees),
            ("max_cell_degrees", self.max_cell_degrees),
        ];
        for (name, v) in sizes {
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {v}"
                )));
            }
        }
        if self.min_cell_degrees < MIN_CELL_DEGREES_FLOOR {
            return Err(ConfigError::Invalid(format!(
                "min_cell_degrees must be at least {MIN_CELL_DEGREES_FLOOR}, got {}",
                self.min_cell_degrees
            )));
        }
        if self.min_cell_degrees > self.max_cell_degrees {
            return Err(ConfigError::Invalid(format!(
                "min_cell_degrees ({}) exceeds max_cell_degrees ({})",
                self.min_cell_degrees, self.max_cell_degrees
            )));
        }
        if self.max_cells == 0 {
            return Err(ConfigError::Invalid("max_cells must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    /// Cap applied when the view state carries none.
    pub max_clusters_default: Option<usize>,
    /// Occupied-cell bound for capped calls, so the quadratic cap reducer
    /// sees a bounded input. A cap above this raises the bound to the cap.
    pub reduce_input_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            max_clusters_default: None,
            reduce_input_limit: DEFAULT_REDUCE_INPUT_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.grid.validate()?;
        if self.max_clusters_default == Some(0) {
            return Err(ConfigError::Invalid(
                "max_clusters_default must be at least 1".to_string(),
            ));
        }
        if self.reduce_input_limit < 2 {
            return Err(ConfigError::Invalid(
                "reduce_input_limit must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_grid_section() {
        let config = EngineConfig::from_toml_str(
            r#"
max_clusters_default = 200

[grid]
max_cells = 1000
"#,
        )
        .unwrap();
        assert_eq!(config.max_clusters_default, Some(200));
        assert_eq!(config.grid.max_cells, 1000);
        assert_eq!(config.grid.base_cell_degrees, DEFAULT_BASE_CELL_DEGREES);
    }

    #[test]
    fn parse_empty_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn rejects_inverted_clamps() {
        let err = EngineConfig::from_toml_str(
            r#"
[grid]
min_cell_degrees = 10.0
max_cell_degrees = 1.0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_non_positive_base() {
        let mut config = EngineConfig::default();
        config.grid.base_cell_degrees = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_cells_finer_than_key_range() {
        let err = EngineConfig::from_toml_str(
            r#"
[grid]
min_cell_degrees = 1e-18
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let mut config = EngineConfig::default();
        config.grid.min_cell_degrees = MIN_CELL_DEGREES_FLOOR;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_zero_default_cap() {
        let config = EngineConfig {
            max_clusters_default: Some(0),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_file() {
        let config = EngineConfig {
            max_clusters_default: Some(64),
            ..EngineConfig::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/geocluster.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
