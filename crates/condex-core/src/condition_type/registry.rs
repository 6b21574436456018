//! Condition Type Registry
//!
//! Concurrent id -> [`ConditionType`] map. Reads never block behind writes,
//! so types can be registered or removed while evaluations are running.

use super::{ConditionType, ConditionTypeResolver};
use crate::error::Result;
use anyhow::Context;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Definitions of the built-in condition kinds
const BUILTIN_CONDITION_TYPES: &str = include_str!("builtin_condition_types.yaml");

/// A definition file holds one type or a list of types
#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
    Many(Vec<ConditionType>),
    One(Box<ConditionType>),
}

impl DefinitionFile {
    fn into_types(self) -> Vec<ConditionType> {
        match self {
            DefinitionFile::Many(types) => types,
            DefinitionFile::One(single) => vec![*single],
        }
    }
}

/// Concurrent condition type registry
#[derive(Debug, Default)]
pub struct ConditionTypeRegistry {
    types: DashMap<String, Arc<ConditionType>>,
}

impl ConditionTypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in condition types
    pub fn with_builtin_types() -> anyhow::Result<Self> {
        let registry = Self::new();
        registry
            .load_from_yaml_str(BUILTIN_CONDITION_TYPES)
            .context("Failed to load built-in condition types")?;
        Ok(registry)
    }

    /// Register a type, replacing any previous definition with the same id
    pub fn register(&self, condition_type: ConditionType) -> Result<Option<Arc<ConditionType>>> {
        condition_type.check_executable()?;
        debug!("Registering condition type: {}", condition_type.id);
        Ok(self
            .types
            .insert(condition_type.id.clone(), Arc::new(condition_type)))
    }

    pub fn unregister(&self, condition_type_id: &str) -> Option<Arc<ConditionType>> {
        debug!("Unregistering condition type: {}", condition_type_id);
        self.types.remove(condition_type_id).map(|(_, ct)| ct)
    }

    pub fn get(&self, condition_type_id: &str) -> Option<Arc<ConditionType>> {
        self.types.get(condition_type_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, condition_type_id: &str) -> bool {
        self.types.contains_key(condition_type_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.types.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Types carrying a system tag
    pub fn by_system_tag(&self, tag: &str) -> Vec<Arc<ConditionType>> {
        self.types
            .iter()
            .filter(|e| e.value().system_tags.iter().any(|t| t == tag))
            .map(|e| e.value().clone())
            .collect()
    }

    /// Register every type in a YAML (or JSON) document
    pub fn load_from_yaml_str(&self, content: &str) -> anyhow::Result<usize> {
        let file: DefinitionFile =
            serde_yaml::from_str(content).context("Failed to parse condition type definitions")?;
        self.register_all(file.into_types())
    }

    /// Load one definition file; `.json` is read as JSON, anything else as YAML
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> anyhow::Result<usize> {
        let path = path.as_ref();
        debug!("Loading condition types from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read condition type file: {}", path.display()))?;

        let file: DefinitionFile = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).with_context(|| {
                format!("Failed to parse condition type file: {}", path.display())
            })?
        } else {
            serde_yaml::from_str(&content).with_context(|| {
                format!("Failed to parse condition type file: {}", path.display())
            })?
        };

        let count = self
            .register_all(file.into_types())
            .with_context(|| format!("Invalid condition type in: {}", path.display()))?;

        info!("Loaded {} condition types from: {}", count, path.display());
        Ok(count)
    }

    /// Load every `.json`, `.yaml` and `.yml` file of a directory.
    ///
    /// Files that fail to load are logged and skipped; the return value is
    /// the number of types registered.
    pub fn load_from_directory(&self, dir: impl AsRef<Path>) -> anyhow::Result<usize> {
        let dir = dir.as_ref();
        info!("Loading condition types from directory: {}", dir.display());

        if !dir.is_dir() {
            return Err(anyhow::anyhow!("Not a directory: {}", dir.display()));
        }

        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext == "json" || ext == "yaml" || ext == "yml")
            })
            .collect();
        entries.sort();

        let mut loaded = 0;
        let mut error_count = 0;
        for path in entries {
            match self.load_from_file(&path) {
                Ok(count) => loaded += count,
                Err(e) => {
                    warn!("Failed to load {}: {:#}", path.display(), e);
                    error_count += 1;
                }
            }
        }

        if error_count > 0 {
            warn!(
                "Loaded {} condition types with {} file errors from: {}",
                loaded,
                error_count,
                dir.display()
            );
        }

        Ok(loaded)
    }

    fn register_all(&self, types: Vec<ConditionType>) -> anyhow::Result<usize> {
        // Validate everything first so a bad file registers nothing
        for condition_type in &types {
            condition_type.check_executable()?;
        }
        let count = types.len();
        for condition_type in types {
            self.register(condition_type)?;
        }
        Ok(count)
    }
}

impl ConditionTypeResolver for ConditionTypeRegistry {
    fn resolve(&self, condition_type_id: &str) -> Option<Arc<ConditionType>> {
        self.get(condition_type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::error::CoreError;

    #[test]
    fn test_builtin_types_load() {
        let registry = ConditionTypeRegistry::with_builtin_types().unwrap();

        for id in [
            "booleanCondition",
            "notCondition",
            "nestedCondition",
            "idsCondition",
            "matchAllCondition",
            "eventTypeCondition",
            "profilePropertyCondition",
            "sessionPropertyCondition",
            "eventPropertyCondition",
            "geoLocationByPointSessionCondition",
            "pastEventCondition",
            "sourceEventPropertyCondition",
        ] {
            let ct = registry.resolve(id).unwrap_or_else(|| panic!("missing {}", id));
            assert!(ct.check_executable().is_ok());
        }

        let ids = registry.resolve("idsCondition").unwrap();
        assert_eq!(ids.evaluator_key.as_deref(), Some("idsConditionEvaluator"));
        assert_eq!(ids.query_builder_key.as_deref(), Some("idsConditionQueryBuilder"));
    }

    #[test]
    fn test_register_rejects_non_executable() {
        let registry = ConditionTypeRegistry::new();
        let err = registry.register(ConditionType::new("broken")).unwrap_err();
        assert!(matches!(err, CoreError::NotExecutable(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = ConditionTypeRegistry::new();
        let macro_type = ConditionType::new("adultCondition")
            .with_parent(Condition::new("profilePropertyCondition"));

        assert!(registry.register(macro_type).unwrap().is_none());
        assert!(registry.resolve("adultCondition").unwrap().is_macro());

        assert!(registry.unregister("adultCondition").is_some());
        assert!(registry.resolve("adultCondition").is_none());
    }

    #[test]
    fn test_by_system_tag() {
        let registry = ConditionTypeRegistry::with_builtin_types().unwrap();
        let profile_types = registry.by_system_tag("profileCondition");
        assert!(profile_types
            .iter()
            .any(|ct| ct.id == "profilePropertyCondition"));
    }
}
