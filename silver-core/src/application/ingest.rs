// silver-core/src/application/ingest.rs

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::domain::entity::EntityKind;
use crate::domain::project::ProjectConfig;
use crate::error::SilverError;
use crate::ports::connector::{Connector, TableRef};

#[derive(Debug, Clone, Serialize)]
pub struct IngestedSource {
    pub entity: EntityKind,
    pub table: String,
    pub path: PathBuf,
    /// `None` when the file was not found and the bronze table was left as is.
    pub rows: Option<u64>,
}

fn resolve(project_dir: &Path, raw: &str) -> PathBuf {
    let raw_path = Path::new(raw);
    if raw_path.is_absolute() {
        raw_path.to_path_buf()
    } else {
        project_dir.join(raw_path)
    }
}

/// Copies every configured CSV source into its bronze table, all columns as text.
#[instrument(skip_all)]
pub async fn ingest_sources(
    connector: &dyn Connector,
    config: &ProjectConfig,
    project_dir: &Path,
) -> Result<Vec<IngestedSource>, SilverError> {
    connector
        .execute(&format!(
            "CREATE SCHEMA IF NOT EXISTS \"{}\"",
            config.layout.bronze.replace('"', "\"\"")
        ))
        .await?;

    let mut ingested = Vec::with_capacity(config.entities.len());
    for &entity in &config.entities {
        let table = TableRef::bronze(&config.layout, entity);
        let path = resolve(project_dir, config.source_path(entity));

        if !path.exists() {
            warn!(%entity, path = ?path, "Source file not found, bronze table left untouched");
            ingested.push(IngestedSource {
                entity,
                table: table.to_string(),
                path,
                rows: None,
            });
            continue;
        }

        let rows = connector
            .register_source(&table, &path.to_string_lossy())
            .await
            .map_err(|e| SilverError::storage(table.to_string(), "ingest", e))?;
        info!(%entity, rows, table = %table, "Source ingested");

        ingested.push(IngestedSource {
            entity,
            table: table.to_string(),
            path,
            rows: Some(rows),
        });
    }
    Ok(ingested)
}
