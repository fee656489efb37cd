//! Bake configuration (TOML)
//!
//! Every field has a default, so an empty or partial document is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_LIFETIME_TICKS, DEFAULT_SWEEP_INTERVAL_TICKS};
use crate::parallel::{DEFAULT_PARALLEL_VERTEX_THRESHOLD, ParallelPolicy};

/// Processor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BakeConfig {
    /// Per-vertex pass settings
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Blend-shape delta cache settings
    #[serde(default)]
    pub blend_shape_cache: BlendShapeCacheConfig,
}

/// Per-vertex pass configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Shard per-vertex passes across rayon workers (default: true)
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Minimum vertex count before sharding kicks in (default: 4096)
    #[serde(default = "default_parallel_vertex_threshold")]
    pub parallel_vertex_threshold: usize,
}

/// Blend-shape cache expiry, measured in processor ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendShapeCacheConfig {
    /// Ticks an entry survives without being touched (default: 300)
    #[serde(default = "default_lifetime_ticks")]
    pub lifetime_ticks: u64,
    /// Expiry is checked every N ticks (default: 60, must be non-zero)
    #[serde(default = "default_sweep_interval_ticks")]
    pub sweep_interval_ticks: u64,
}

fn default_true() -> bool {
    true
}
fn default_parallel_vertex_threshold() -> usize {
    DEFAULT_PARALLEL_VERTEX_THRESHOLD
}
fn default_lifetime_ticks() -> u64 {
    DEFAULT_LIFETIME_TICKS
}
fn default_sweep_interval_ticks() -> u64 {
    DEFAULT_SWEEP_INTERVAL_TICKS
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel: default_true(),
            parallel_vertex_threshold: default_parallel_vertex_threshold(),
        }
    }
}

impl Default for BlendShapeCacheConfig {
    fn default() -> Self {
        Self {
            lifetime_ticks: default_lifetime_ticks(),
            sweep_interval_ticks: default_sweep_interval_ticks(),
        }
    }
}

impl ProcessingConfig {
    pub fn policy(&self) -> ParallelPolicy {
        ParallelPolicy {
            enabled: self.parallel,
            min_vertices: self.parallel_vertex_threshold,
        }
    }
}

/// Error loading a [`BakeConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl BakeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or holds
    /// invalid values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> String {
        // Plain structs of integers and bools always serialize
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blend_shape_cache.sweep_interval_ticks == 0 {
            return Err(ConfigError::Invalid(
                "blend_shape_cache.sweep_interval_ticks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
