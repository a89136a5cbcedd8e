//! catalog_core - Static condition definitions
//!
//! Conditions are pure data: modifiers, behavioural flags and the list of
//! conditions each one implies. A [`ConditionCatalog`] is loaded once (from
//! TOML/JSON files or the bundled table) and shared read-only afterwards.

mod config;
mod definition;
mod registry;

pub use config::CatalogFileConfig;
pub use definition::{ConditionDefinition, ConditionFlags, ConditionId, ConditionModifiers};
pub use registry::ConditionCatalog;

use std::path::PathBuf;
use thiserror::Error;

/// Error loading or validating a condition catalog
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error{}: {error}", location(.path))]
    Io {
        error: std::io::Error,
        path: Option<PathBuf>,
    },
    #[error("Parse error{}: {error}", location(.path))]
    Parse {
        error: toml::de::Error,
        path: Option<PathBuf>,
    },
    #[error("JSON parse error{}: {error}", location(.path))]
    Json {
        error: serde_json::Error,
        path: Option<PathBuf>,
    },
    #[error("Validation error{}: {message}", location(.path))]
    Validation {
        message: String,
        path: Option<PathBuf>,
    },
}

fn location(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in '{}'", path.display()),
        None => String::new(),
    }
}
