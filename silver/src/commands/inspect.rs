// silver/src/commands/inspect.rs
//
// USE CASE: Inspect a warehouse table (schema + sample rows).

use comfy_table::Table;
use std::path::Path;

use silver_core::ports::connector::{Connector, TableRef};

pub async fn execute(project_dir: &Path, table: String, limit: usize) -> anyhow::Result<()> {
    let config = super::load_config(project_dir)?;
    let db_path = super::database_path(project_dir, &config);
    if config.database != ":memory:" && !db_path.exists() {
        anyhow::bail!(
            "❌ Database not found at: {}\n👉 Have you run 'silver run'?",
            db_path.display()
        );
    }
    let connector = super::open_warehouse(project_dir, &config)?;

    let target = TableRef::parse(&table, &config.layout.silver);
    println!("\n🔍 Inspecting Table: {}", target);

    let columns = connector.fetch_columns(&target).await?;
    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let mut schema = Table::new();
    schema.set_header(vec!["Column", "Type", "Nullable"]);
    for column in &columns {
        schema.add_row(vec![
            column.name.clone(),
            column.data_type.clone(),
            if column.is_nullable { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{schema}");

    let select = names
        .iter()
        .map(|c| format!("CAST(\"{0}\" AS VARCHAR) AS \"{0}\"", c.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(", ");
    let rows = connector
        .query_text_rows(&format!("SELECT {} FROM {} LIMIT {}", select, target, limit))
        .await?;
    let total = connector.count_rows(&target).await?;

    println!("   --- Rows ({} of {}) ---", rows.len(), total);
    let mut sample = Table::new();
    sample.set_header(names);
    for row in rows {
        sample.add_row(
            row.into_iter()
                .map(|c| c.unwrap_or_else(|| "NULL".to_string()))
                .collect::<Vec<_>>(),
        );
    }
    println!("{sample}");

    Ok(())
}
