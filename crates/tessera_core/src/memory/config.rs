//! # Memory Configuration
//!
//! Chunk-count configuration, loaded once at startup from TOML. Element
//! sizes and alignments are always derived from the type, never from the
//! config file.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Chunk capacity used for pools when no override applies.
pub const DEFAULT_CHUNK_COUNT: usize = 150;

/// Pool capacity settings for a whole subsystem.
///
/// # Example
///
/// ```toml
/// chunk_count = 150
/// growing_chunk_count = 256
///
/// [overrides]
/// "game_ui::widgets::Tooltip" = 32
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Chunk capacity for registry pools without an override.
    pub chunk_count: usize,
    /// Chunk capacity for each pool appended by a growing pool list.
    pub growing_chunk_count: usize,
    /// Per-type capacity overrides, keyed by full type path.
    pub overrides: HashMap<String, usize>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chunk_count: DEFAULT_CHUNK_COUNT,
            growing_chunk_count: DEFAULT_CHUNK_COUNT,
            overrides: HashMap::new(),
        }
    }
}

impl MemoryConfig {
    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML or unknown fields;
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`from_toml`](MemoryConfig::from_toml).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Chunk capacity for the type at `type_path`, falling back to the
    /// subsystem default.
    #[must_use]
    pub fn chunk_count_for(&self, type_path: &str) -> usize {
        self.overrides
            .get(type_path)
            .copied()
            .unwrap_or(self.chunk_count)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_count == 0 || self.growing_chunk_count == 0 {
            return Err(ConfigError::Invalid(
                "chunk counts must be nonzero".to_string(),
            ));
        }
        if let Some((name, _)) = self.overrides.iter().find(|(_, count)| **count == 0) {
            return Err(ConfigError::Invalid(format!(
                "override for {name} must be nonzero"
            )));
        }
        Ok(())
    }
}
