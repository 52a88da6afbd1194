// silver/src/commands/init.rs
//
// USE CASE: Provision the warehouse.

use std::path::Path;

use silver_core::application::provision_warehouse;

pub async fn execute(project_dir: &Path) -> anyhow::Result<()> {
    let config = super::load_config(project_dir)?;
    let connector = super::open_warehouse(project_dir, &config)?;

    let tables = provision_warehouse(&connector, &config.layout, &config.entities).await?;
    for table in &tables {
        println!("   🏗️  {}", table);
    }
    println!("\n✨ Warehouse ready ({} silver tables).", tables.len());
    Ok(())
}
