// silver/src/commands/mod.rs

pub mod check;
pub mod clean;
pub mod ingest;
pub mod init;
pub mod inspect;
pub mod run;

use anyhow::Context;
use std::path::{Path, PathBuf};

use silver_core::domain::project::ProjectConfig;
use silver_core::infrastructure::adapters::DuckDBConnector;
use silver_core::infrastructure::config::load_project_config;

pub(crate) fn load_config(project_dir: &Path) -> anyhow::Result<ProjectConfig> {
    println!("⚙️  Loading configuration...");
    let config = load_project_config(project_dir).with_context(|| {
        format!(
            "Failed to load project configuration from {:?}",
            project_dir
        )
    })?;
    println!("   Project: {} (v{})", config.name, config.version);
    Ok(config)
}

/// Database file resolved against the project directory. `:memory:` passes through.
pub(crate) fn database_path(project_dir: &Path, config: &ProjectConfig) -> PathBuf {
    if config.database == ":memory:" {
        return PathBuf::from(":memory:");
    }
    let raw = Path::new(&config.database);
    if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        project_dir.join(raw)
    }
}

pub(crate) fn open_warehouse(project_dir: &Path, config: &ProjectConfig) -> anyhow::Result<DuckDBConnector> {
    let db_path = database_path(project_dir, config);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    println!("   Engine: DuckDB 🦆 ({})", db_path.display());
    DuckDBConnector::new(&db_path.to_string_lossy())
        .with_context(|| format!("Failed to initialize DuckDB at {}", db_path.display()))
}

pub(crate) fn target_dir(project_dir: &Path, config: &ProjectConfig) -> PathBuf {
    project_dir.join(&config.target_path)
}
