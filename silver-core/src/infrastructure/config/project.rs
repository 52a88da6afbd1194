// silver-core/src/infrastructure/config/project.rs

use serde::{Deserialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::entity::EntityKind;
use crate::domain::project::{ProjectConfig, QualitySettings};
use crate::domain::rules::RuleStep;
use crate::infrastructure::error::InfrastructureError;

pub const PROJECT_FILES: [&str; 2] = ["silver_project.yaml", "silver.yaml"];

#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    load_project_config_with(project_dir, |key| std::env::var(key).ok())
}

/// Same as [`load_project_config`], reading overrides through `env` instead of the process environment.
pub fn load_project_config_with<F>(project_dir: &Path, env: F) -> Result<ProjectConfig, InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    // 1. Découverte du fichier principal
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project manifest");

    // 2. Chargement YAML Base
    let mut config: ProjectConfig = load_fragment(&config_path)?;

    // 3. Hydratation des Satellites (Fail-Secure)
    if let Some(config_folder) = config.config_paths.first() {
        let config_dir = project_dir.join(config_folder);
        if config_dir.exists() {
            load_satellite_configs(&mut config, &config_dir)?;
        }
    }

    // 4. Override via Variables d'Environnement
    apply_env_overrides(&mut config, env)?;

    config.validate()?;
    Ok(config)
}

pub fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    for filename in PROJECT_FILES {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, PROJECT_FILES
    )))
}

/// Charge un fragment de configuration typé depuis un fichier.
fn load_fragment<T: DeserializeOwned>(path: &Path) -> Result<T, InfrastructureError> {
    let content = fs::read_to_string(path).map_err(|e| {
        InfrastructureError::ConfigError(format!("Failed to read {:?}: {}", path, e))
    })?;
    serde_yaml::from_str(&content).map_err(|e| {
        InfrastructureError::ConfigError(format!("Failed to parse YAML at {:?}: {}", path, e))
    })
}

fn load_satellite_configs(
    config: &mut ProjectConfig,
    config_dir: &Path,
) -> Result<(), InfrastructureError> {
    // A. Rule set overrides
    let rules_path = config_dir.join("rules.yml");
    if rules_path.exists() {
        #[derive(Deserialize)]
        struct RulesWrapper {
            rules: BTreeMap<EntityKind, Vec<RuleStep>>,
        }

        let wrapper: RulesWrapper = load_fragment(&rules_path)?;
        for (entity, steps) in wrapper.rules {
            if config.rules.insert(entity, steps).is_some() {
                warn!(%entity, "rules.yml overrides the rule set declared in the project file");
            }
        }
        info!("  📐 Rule overrides loaded");
    }

    // B. Quality settings
    let qual_path = config_dir.join("quality.yml");
    if qual_path.exists() {
        #[derive(Deserialize)]
        struct QualityWrapper {
            quality: QualitySettings,
        }

        let wrapper: QualityWrapper = load_fragment(&qual_path)?;
        config.quality = wrapper.quality;
        info!("  ✅ Quality settings loaded");
    }

    Ok(())
}

fn apply_env_overrides<F>(config: &mut ProjectConfig, env: F) -> Result<(), InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = env("SILVER_DATABASE") {
        info!(old = ?config.database, new = ?val, "Overriding database via ENV");
        config.database = val;
    }
    if let Some(val) = env("SILVER_TARGET_PATH") {
        info!(old = ?config.target_path, new = ?val, "Overriding target path via ENV");
        config.target_path = val;
    }
    if let Some(val) = env("SILVER_STRICT") {
        config.quality.strict = match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            other => {
                return Err(InfrastructureError::ConfigError(format!(
                    "SILVER_STRICT must be a boolean, got '{}'",
                    other
                )));
            }
        };
        info!(strict = config.quality.strict, "Overriding strict mode via ENV");
    }
    Ok(())
}
