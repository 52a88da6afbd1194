// silver-core/src/domain/project/configuration.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use validator::{Validate, ValidationError};

use crate::domain::entity::EntityKind;
use crate::domain::rules::{RuleCatalog, RuleStep};

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ProjectConfig {
    #[validate(length(min = 1, message = "Project name cannot be empty"))]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,

    /// DuckDB file, relative to the project directory. `:memory:` is accepted.
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(rename = "config-paths", default = "default_config_paths")]
    pub config_paths: Vec<String>,

    #[serde(rename = "target-path", default = "default_target_path")]
    pub target_path: String,

    #[serde(rename = "clean-targets", default = "default_clean_targets")]
    pub clean_targets: Vec<String>,

    #[serde(default)]
    #[validate(nested)]
    pub layout: WarehouseLayout,

    /// Entity → CSV path used by `silver ingest`.
    #[serde(default)]
    pub sources: BTreeMap<EntityKind, String>,

    /// Load order of a full refresh.
    #[serde(default = "EntityKind::declared_order")]
    #[validate(custom(function = "validate_unique_entities"))]
    pub entities: Vec<EntityKind>,

    #[serde(default)]
    #[validate(nested)]
    pub quality: QualitySettings,

    /// Rule set overrides, replacing the built-in set of each listed entity.
    #[serde(default)]
    pub rules: BTreeMap<EntityKind, Vec<RuleStep>>,
}

impl ProjectConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: default_version(),
            database: default_database(),
            config_paths: default_config_paths(),
            target_path: default_target_path(),
            clean_targets: default_clean_targets(),
            layout: WarehouseLayout::default(),
            sources: BTreeMap::new(),
            entities: EntityKind::declared_order(),
            quality: QualitySettings::default(),
            rules: BTreeMap::new(),
        }
    }

    pub fn source_path(&self, entity: EntityKind) -> &str {
        self.sources
            .get(&entity)
            .map(String::as_str)
            .unwrap_or_else(|| entity.default_source_path())
    }

    pub fn rule_catalog(&self) -> RuleCatalog {
        RuleCatalog::builtin().with_overrides(&self.rules)
    }
}

/// Schema names of the two layers inside the warehouse database.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct WarehouseLayout {
    #[serde(default = "default_bronze")]
    #[validate(custom(function = "validate_identifier"))]
    pub bronze: String,
    #[serde(default = "default_silver")]
    #[validate(custom(function = "validate_identifier"))]
    pub silver: String,
}

impl Default for WarehouseLayout {
    fn default() -> Self {
        Self {
            bronze: default_bronze(),
            silver: default_silver(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Validate)]
pub struct QualitySettings {
    /// Maximum accepted |sales - quantity * price|.
    #[serde(default = "default_tolerance")]
    #[validate(range(min = 0.0, max = 1.0, message = "Tolerance must be within [0, 1]"))]
    pub tolerance: f64,

    /// Fail `silver check` when any check reports violations.
    #[serde(default)]
    pub strict: bool,

    /// Birthdates before this day are reported as implausible.
    #[serde(rename = "birthdate-floor", default = "default_birthdate_floor")]
    pub birthdate_floor: NaiveDate,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            strict: false,
            birthdate_floor: default_birthdate_floor(),
        }
    }
}

fn validate_unique_entities(entities: &[EntityKind]) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for entity in entities {
        if !seen.insert(entity) {
            let mut err = ValidationError::new("duplicate_entity");
            err.message = Some(format!("Entity '{}' is listed twice", entity).into());
            return Err(err);
        }
    }
    Ok(())
}

fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_identifier");
        err.message = Some(format!("'{}' is not a valid schema name", name).into());
        Err(err)
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}
fn default_database() -> String {
    "warehouse.duckdb".to_string()
}
fn default_config_paths() -> Vec<String> {
    vec!["config".to_string()]
}
fn default_clean_targets() -> Vec<String> {
    vec!["target".to_string()]
}
fn default_target_path() -> String {
    "target".to_string()
}
fn default_bronze() -> String {
    "bronze".to_string()
}
fn default_silver() -> String {
    "silver".to_string()
}
fn default_tolerance() -> f64 {
    0.01
}
fn default_birthdate_floor() -> NaiveDate {
    NaiveDate::from_ymd_opt(1924, 1, 1).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_project_gets_defaults() {
        let config: ProjectConfig = serde_yaml::from_str("name: demo").unwrap();
        assert_eq!(config.database, "warehouse.duckdb");
        assert_eq!(config.layout.silver, "silver");
        assert_eq!(config.entities, EntityKind::declared_order());
        assert_eq!(config.quality.tolerance, 0.01);
        assert_eq!(
            config.quality.birthdate_floor,
            NaiveDate::from_ymd_opt(1924, 1, 1).unwrap()
        );
        assert_eq!(
            config.source_path(EntityKind::Location),
            "datasets/source_erp/LOC_A101.csv"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_entities_are_rejected() {
        let config: ProjectConfig =
            serde_yaml::from_str("name: demo\nentities: [customer, sales, customer]").unwrap();
        let errors = config.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("entities"));
    }

    #[test]
    fn test_nested_validation() {
        let yaml = "name: demo\nquality:\n  tolerance: 5\nlayout:\n  silver: \"silver; DROP\"";
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        let errors = config.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("quality"));
        assert!(fields.contains_key("layout"));
    }

    #[test]
    fn test_rule_overrides_reach_the_catalog() {
        let yaml = r#"
name: demo
rules:
  location: []
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        let catalog = config.rule_catalog();
        assert!(catalog.rules_for(EntityKind::Location).is_empty());
        assert!(!catalog.rules_for(EntityKind::Product).is_empty());
    }
}
