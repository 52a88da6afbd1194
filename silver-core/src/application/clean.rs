// silver-core/src/application/clean.rs

use crate::domain::project::ProjectConfig;
use crate::error::SilverError;
use std::fs;
use std::path::{Component, Path};

/// Removes the configured artifact directories. Returns the ones that existed.
pub fn clean_project(project_dir: &Path, config: &ProjectConfig) -> Result<Vec<String>, SilverError> {
    tracing::info!("🧹 Initializing Silver cleanup sequence...");

    let targets = if config.clean_targets.is_empty() {
        vec![config.target_path.clone()]
    } else {
        config.clean_targets.clone()
    };

    let mut removed = Vec::new();
    for target_rel_path in targets {
        // Zero-Trust Path Traversal Guard
        let escapes = Path::new(&target_rel_path).components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        let full_path = project_dir.join(&target_rel_path);
        if escapes || target_rel_path.trim().is_empty() || !full_path.starts_with(project_dir) {
            return Err(SilverError::UnsafePath(target_rel_path));
        }

        if full_path.exists() {
            if full_path.is_dir() {
                fs::remove_dir_all(&full_path)?;
            } else {
                fs::remove_file(&full_path)?;
            }
            tracing::info!(path = %target_rel_path, "Artifact removed");
            removed.push(target_rel_path);
        }
    }

    Ok(removed)
}
