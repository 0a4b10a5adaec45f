//! Engine configuration: the spaciousness-check threshold, the dense
//! ladder length and the silence holds.
//!
//! # Example YAML
//!
//! ```yaml
//! spaciousness_check_threshold: 3
//! dense_layer_count: 4
//! contact_hold_secs: 75
//! dense_hold_secs: 60
//! spacious_hold_secs: 60
//! spaciousness_hold_secs: 60
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::memory::MAX_DENSE_LAYERS;

/// Tunables for [`crate::engine::Engine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Completed spacious stays required before the spaciousness check is
    /// offered.
    pub spaciousness_check_threshold: u32,
    /// Number of dense layers before the continue-or-stop offer.
    pub dense_layer_count: u8,
    /// Silence after the clench instruction.
    pub contact_hold_secs: u64,
    /// Silence after each dense layer.
    pub dense_hold_secs: u64,
    /// Silence after a spacious stay.
    pub spacious_hold_secs: u64,
    /// Silence after the spaciousness check.
    pub spaciousness_hold_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spaciousness_check_threshold: 3,
            dense_layer_count: MAX_DENSE_LAYERS,
            contact_hold_secs: 75,
            dense_hold_secs: 60,
            spacious_hold_secs: 60,
            spaciousness_hold_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Parse from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a YAML file on disk.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Same configuration with every hold set to zero.
    pub fn without_holds(self) -> Self {
        Self {
            contact_hold_secs: 0,
            dense_hold_secs: 0,
            spacious_hold_secs: 0,
            spaciousness_hold_secs: 0,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dense_layer_count == 0 || self.dense_layer_count > MAX_DENSE_LAYERS {
            return Err(ConfigError::Validation(format!(
                "dense_layer_count must be between 1 and {}, got {}",
                MAX_DENSE_LAYERS, self.dense_layer_count
            )));
        }
        Ok(())
    }
}
