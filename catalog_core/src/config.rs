use crate::definition::ConditionDefinition;
use serde::{Deserialize, Serialize};

/// On-disk layout of a catalog file (TOML or JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFileConfig {
    #[serde(default)]
    pub conditions: Vec<ConditionDefinition>,
}
