// silver/src/commands/run.rs
//
// USE CASE: Full refresh of every silver table.

use chrono::NaiveDate;
use comfy_table::Table;
use serde_json::json;
use std::path::Path;

use silver_core::application::{provision_warehouse, run_batch};
use silver_core::domain::batch::{BatchContext, StepStatus};
use silver_core::domain::transform::TransformContext;
use silver_core::infrastructure::fs::write_json;
use silver_core::ports::connector::Connector;

pub const RUN_RESULTS: &str = "run_results.json";

pub async fn execute(project_dir: &Path, as_of: Option<NaiveDate>) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    // A. Config + Adapter
    let config = super::load_config(project_dir)?;
    let connector = super::open_warehouse(project_dir, &config)?;

    // B. Silver tables must exist before the first replace
    provision_warehouse(&connector, &config.layout, &config.entities).await?;

    // C. Run the batch (Application Layer)
    let ctx = as_of.map(TransformContext::capped).unwrap_or_default();
    if as_of.is_some_and(|d| d > ctx.as_of) {
        println!("⚠️  --as-of is later than today, using {} instead", ctx.as_of);
    }
    let catalog = config.rule_catalog();
    let mut batch = BatchContext::new(config.entities.clone());

    println!("🟢 Full refresh of {} entities (as of {})...", batch.plan.len(), ctx.as_of);
    let result = run_batch(&connector, &catalog, &config.layout, &ctx, &mut batch).await;

    // D. Report, written on success and on abort alike
    let error = result.as_ref().err().map(|e| {
        json!({
            "code": e.code(),
            "message": e.to_string(),
        })
    });
    let report = json!({
        "success": result.is_ok(),
        "project": config.name,
        "engine": connector.engine_name(),
        "as_of": ctx.as_of,
        "batch": batch,
        "error": error,
    });
    let report_path = super::target_dir(project_dir, &config).join(RUN_RESULTS);
    write_json(&report_path, &report)?;

    print_steps(&batch);

    match result {
        Ok(()) => {
            let _ = connector.execute("CHECKPOINT").await;
            println!(
                "\n✨ SUCCESS! {} rows written in {:.2?}",
                batch.rows_written(),
                start.elapsed()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("\n💥 BATCH ABORTED: {}", e);
            eprintln!("   Report: {}", report_path.display());
            std::process::exit(1);
        }
    }
}

fn print_steps(batch: &BatchContext) {
    let mut table = Table::new();
    table.set_header(vec!["Entity", "Table", "Status", "Rows read", "Rows written", "Duration"]);
    for step in &batch.steps {
        let status = match step.status {
            StepStatus::Success => "✅ success",
            StepStatus::Failed => "❌ failed",
        };
        table.add_row(vec![
            step.entity.to_string(),
            step.table.clone(),
            status.to_string(),
            step.rows_read.to_string(),
            step.rows_written.to_string(),
            format!("{} ms", step.duration_ms),
        ]);
    }
    println!("{table}");
}
