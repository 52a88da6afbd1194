// silver/src/commands/ingest.rs
//
// USE CASE: Load the CSV sources into bronze.

use std::path::Path;

use silver_core::application::ingest_sources;

pub async fn execute(project_dir: &Path) -> anyhow::Result<()> {
    let config = super::load_config(project_dir)?;
    let connector = super::open_warehouse(project_dir, &config)?;

    println!("📥 Ingesting sources...");
    let report = ingest_sources(&connector, &config, project_dir).await?;
    for source in &report {
        match source.rows {
            Some(rows) => println!("   ✅ {} ← {} ({} rows)", source.table, source.path.display(), rows),
            None => println!(
                "   ⚠️  Warning: Source file not found at {:?}",
                source.path
            ),
        }
    }
    Ok(())
}
