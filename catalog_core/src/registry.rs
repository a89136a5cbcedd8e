use crate::config::CatalogFileConfig;
use crate::definition::{ConditionDefinition, ConditionId};
use crate::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Condition table shipped with the crate
const BUILTIN_CATALOG: &str = include_str!("../conditions/core.toml");

/// Registry of all condition definitions, keyed by id
///
/// Declaration order is preserved so listings and cascades are deterministic.
#[derive(Debug, Clone, Default)]
pub struct ConditionCatalog {
    order: Vec<ConditionId>,
    definitions: HashMap<ConditionId, ConditionDefinition>,
}

impl ConditionCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled default condition table
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::parse_toml(BUILTIN_CATALOG)
    }

    /// Build a validated catalog from definitions
    pub fn from_definitions<I>(definitions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ConditionDefinition>,
    {
        let mut catalog = Self::new();
        for def in definitions {
            catalog.insert_unique(def, None)?;
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load all catalog files from a directory (recursively)
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let mut catalog = Self::new();
        catalog.load_dir(dir)?;
        catalog.validate()?;
        info!(
            conditions = catalog.len(),
            dir = %dir.display(),
            "condition catalog loaded"
        );
        Ok(catalog)
    }

    /// Load a single catalog file (`.toml` or `.json`)
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let mut catalog = Self::new();
        catalog.read_file(path)?;
        catalog.validate().map_err(|e| with_path(e, path))?;
        Ok(catalog)
    }

    /// Parse a catalog from TOML text
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: CatalogFileConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse { error: e, path: None })?;
        Self::from_definitions(config.conditions)
    }

    /// Parse a catalog from JSON text
    pub fn parse_json(content: &str) -> Result<Self, ConfigError> {
        let config: CatalogFileConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Json { error: e, path: None })?;
        Self::from_definitions(config.conditions)
    }

    fn load_dir(&mut self, dir: &Path) -> Result<(), ConfigError> {
        if !dir.exists() {
            return Ok(());
        }

        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io {
            error: e,
            path: Some(dir.to_path_buf()),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::Io {
                error: e,
                path: Some(dir.to_path_buf()),
            })?;
            paths.push(entry.path());
        }
        // read_dir order is platform dependent
        paths.sort();

        for path in paths {
            if path.is_dir() {
                self.load_dir(&path)?;
            } else if is_catalog_file(&path) {
                self.read_file(&path)?;
            }
        }

        Ok(())
    }

    fn read_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            error: e,
            path: Some(path.to_path_buf()),
        })?;

        let config: CatalogFileConfig = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Json {
                error: e,
                path: Some(path.to_path_buf()),
            })?
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                error: e,
                path: Some(path.to_path_buf()),
            })?
        };

        for def in config.conditions {
            self.insert_unique(def, Some(path))?;
        }
        Ok(())
    }

    fn insert_unique(
        &mut self,
        def: ConditionDefinition,
        path: Option<&Path>,
    ) -> Result<(), ConfigError> {
        if def.id.as_str().trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("condition '{}' has an empty id", def.label),
                path: path.map(Path::to_path_buf),
            });
        }
        if self.definitions.contains_key(&def.id) {
            return Err(ConfigError::Validation {
                message: format!("duplicate condition id '{}'", def.id),
                path: path.map(Path::to_path_buf),
            });
        }
        self.register(def);
        Ok(())
    }

    /// Register a definition without validation, replacing any previous one
    pub fn register(&mut self, def: ConditionDefinition) {
        if !self.definitions.contains_key(&def.id) {
            self.order.push(def.id.clone());
        }
        self.definitions.insert(def.id.clone(), def);
    }

    /// Check implications: every implied id must exist, and no condition may
    /// imply itself directly or through a cycle
    pub fn validate(&self) -> Result<(), ConfigError> {
        for def in self.iter() {
            for implied in &def.implied_conditions {
                if implied == &def.id {
                    return Err(validation(format!("condition '{}' implies itself", def.id)));
                }
                if !self.contains(implied.as_str()) {
                    return Err(validation(format!(
                        "condition '{}' implies unknown condition '{}'",
                        def.id, implied
                    )));
                }
            }
        }

        let mut finished: HashSet<&str> = HashSet::new();
        for id in &self.order {
            let mut path = Vec::new();
            self.check_cycle(id.as_str(), &mut path, &mut finished)?;
        }
        Ok(())
    }

    fn check_cycle<'a>(
        &'a self,
        id: &'a str,
        path: &mut Vec<&'a str>,
        finished: &mut HashSet<&'a str>,
    ) -> Result<(), ConfigError> {
        if finished.contains(id) {
            return Ok(());
        }
        if path.contains(&id) {
            path.push(id);
            return Err(validation(format!(
                "implication cycle detected: {}",
                path.join(" -> ")
            )));
        }

        path.push(id);
        if let Some(def) = self.definitions.get(id) {
            for implied in &def.implied_conditions {
                self.check_cycle(implied.as_str(), path, finished)?;
            }
        }
        path.pop();
        finished.insert(id);
        Ok(())
    }

    /// Get a definition by ID
    pub fn get(&self, id: &str) -> Option<&ConditionDefinition> {
        self.definitions.get(id)
    }

    /// Check if a condition exists
    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Definitions in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &ConditionDefinition> {
        self.order.iter().filter_map(|id| self.definitions.get(id))
    }

    /// List all condition IDs in declaration order
    pub fn condition_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|id| id.as_str())
    }

    /// Definitions that list `id` among their implied conditions
    pub fn implying(&self, id: &str) -> impl Iterator<Item = &ConditionDefinition> + '_ {
        let id = id.to_string();
        self.iter().filter(move |def| def.implies(&id))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn is_catalog_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "toml" || ext == "json")
}

fn validation(message: String) -> ConfigError {
    ConfigError::Validation { message, path: None }
}

fn with_path(err: ConfigError, path: &Path) -> ConfigError {
    match err {
        ConfigError::Validation { message, path: None } => ConfigError::Validation {
            message,
            path: Some(PathBuf::from(path)),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_catalog_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = ConditionCatalog::builtin().unwrap();

        let prone = catalog.get("prone").unwrap();
        assert_eq!(prone.modifiers.defense_melee, Some(-4));
        assert_eq!(prone.modifiers.defense_ranged, Some(2));

        let poisoned = catalog.get("poisoned").unwrap();
        assert_eq!(poisoned.flags.end_of_turn_damage, 1);
        assert_eq!(poisoned.modifiers.all_rolls, -2);

        let unconscious = catalog.get("unconscious").unwrap();
        let implied: Vec<&str> = unconscious
            .implied_conditions
            .iter()
            .map(|c| c.as_str())
            .collect();
        assert_eq!(implied, vec!["defenseless", "prone"]);

        assert!(catalog.get("hidden").unwrap().flags.lost_on_attack);
    }

    #[test]
    fn test_load_directory() {
        let dir = TempDir::new().unwrap();
        create_catalog_file(
            dir.path(),
            "a_basic.toml",
            r#"
[[conditions]]
id = "prone"
label = "Prone"

[conditions.modifiers]
defense_melee = -4
defense_ranged = 2
"#,
        );
        std::fs::create_dir(dir.path().join("extra")).unwrap();
        create_catalog_file(
            &dir.path().join("extra"),
            "b_compound.json",
            r#"{
  "conditions": [
    { "id": "knocked_down", "label": "Knocked Down", "implies": ["prone"] }
  ]
}"#,
        );
        create_catalog_file(dir.path(), "notes.txt", "not a catalog");

        let catalog = ConditionCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("knocked_down").unwrap().implies("prone"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = ConditionCatalog::load(&dir.path().join("missing")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let body = r#"
[[conditions]]
id = "prone"
label = "Prone"
"#;
        create_catalog_file(dir.path(), "one.toml", body);
        create_catalog_file(dir.path(), "two.toml", body);

        let result = ConditionCatalog::load(dir.path());
        assert!(matches!(
            result,
            Err(ConfigError::Validation { path: Some(_), .. })
        ));
    }

    #[test]
    fn test_unknown_implied_condition_rejected() {
        let result = ConditionCatalog::parse_toml(
            r#"
[[conditions]]
id = "unconscious"
label = "Unconscious"
implies = ["defenseless"]
"#,
        );
        match result {
            Err(ConfigError::Validation { message, .. }) => {
                assert!(message.contains("defenseless"), "{}", message)
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_detection() {
        let result = ConditionCatalog::parse_toml(
            r#"
[[conditions]]
id = "a"
label = "A"
implies = ["b"]

[[conditions]]
id = "b"
label = "B"
implies = ["c"]

[[conditions]]
id = "c"
label = "C"
implies = ["a"]
"#,
        );
        match result {
            Err(ConfigError::Validation { message, .. }) => {
                assert!(message.contains("cycle"), "{}", message)
            }
            other => panic!("Expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_implication_rejected() {
        let def = ConditionDefinition::new("loop", "Loop").implying(["loop"]);
        assert!(ConditionCatalog::from_definitions([def]).is_err());
    }

    #[test]
    fn test_parse_error_reported() {
        let result = ConditionCatalog::parse_toml("[[conditions]]\nid = 5");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        let result = ConditionCatalog::parse_json("{ not json");
        assert!(matches!(result, Err(ConfigError::Json { .. })));
    }

    #[test]
    fn test_declaration_order_and_reverse_lookup() {
        let catalog = ConditionCatalog::builtin().unwrap();
        let ids: Vec<&str> = catalog.condition_ids().collect();
        let prone_pos = ids.iter().position(|id| *id == "prone").unwrap();
        let unconscious_pos = ids.iter().position(|id| *id == "unconscious").unwrap();
        assert!(prone_pos < unconscious_pos);

        let parents: Vec<&str> = catalog.implying("prone").map(|d| d.id.as_str()).collect();
        assert!(parents.contains(&"unconscious"));
    }

    #[test]
    fn test_register_replaces_without_reordering() {
        let mut catalog = ConditionCatalog::new();
        catalog.register(ConditionDefinition::new("a", "A"));
        catalog.register(ConditionDefinition::new("b", "B"));
        catalog.register(ConditionDefinition::new("a", "A2"));

        let ids: Vec<&str> = catalog.condition_ids().collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(catalog.get("a").unwrap().label, "A2");
    }
}
