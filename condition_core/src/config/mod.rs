//! Engine configuration loading

use catalog_core::ConditionCatalog;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error loading engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Catalog error: {0}")]
    CatalogError(#[from] catalog_core::ConfigError),
}

/// Tunable engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Catalog file or directory; the bundled table is used when absent
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    /// How deep implied conditions may chain
    #[serde(default = "default_max_cascade_depth")]
    pub max_cascade_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            catalog_path: None,
            max_cascade_depth: default_max_cascade_depth(),
        }
    }
}

fn default_max_cascade_depth() -> u32 {
    8
}

impl EngineConfig {
    /// Load settings from a TOML file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse settings from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load the catalog these settings point at
    pub fn load_catalog(&self) -> Result<ConditionCatalog, ConfigError> {
        let catalog = match &self.catalog_path {
            Some(path) if path.is_dir() => ConditionCatalog::load(path)?,
            Some(path) => ConditionCatalog::load_file(path)?,
            None => ConditionCatalog::builtin()?,
        };
        Ok(catalog)
    }
}
