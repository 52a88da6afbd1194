// silver/src/commands/check.rs
//
// USE CASE: Quality suite over the silver tables.

use comfy_table::Table;
use std::path::Path;

use silver_core::application::{project_suite, run_quality_suite};
use silver_core::domain::quality::{CheckOutcome, QualityReport};
use silver_core::infrastructure::fs::write_json;

pub const QUALITY_RESULTS: &str = "quality_results.json";

const SAMPLE_ROWS: usize = 3;

pub async fn execute(project_dir: &Path, strict_flag: bool) -> anyhow::Result<()> {
    let config = super::load_config(project_dir)?;
    let connector = super::open_warehouse(project_dir, &config)?;

    let strict = strict_flag || config.quality.strict;
    if strict {
        println!("    🔒 Strict Mode: ON");
    } else {
        println!("    🔓 Strict Mode: OFF (findings are reported only)");
    }

    let checks = project_suite(&config);
    println!("🧪 Running {} quality checks...", checks.len());
    let report = run_quality_suite(&connector, &config.layout, &checks).await?;

    let report_path = super::target_dir(project_dir, &config).join(QUALITY_RESULTS);
    write_json(&report_path, &report)?;

    println!("{}", render(&report));
    for outcome in report.failed() {
        print_samples(outcome);
    }

    let failed = report.failed().count();
    if failed == 0 {
        println!("\n✨ All {} checks passed.", report.outcomes.len());
        return Ok(());
    }

    println!(
        "\n⚠️  {} of {} checks found {} violating rows. Report: {}",
        failed,
        report.outcomes.len(),
        report.violation_count(),
        report_path.display()
    );
    if strict {
        eprintln!("❌ Quality gate failed (strict mode).");
        std::process::exit(1);
    }
    Ok(())
}

fn render(report: &QualityReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Check", "Severity", "Violations", "Status"]);
    for outcome in &report.outcomes {
        table.add_row(vec![
            outcome.name.clone(),
            format!("{:?}", outcome.severity).to_lowercase(),
            outcome.violations.len().to_string(),
            if outcome.passed() { "✅ PASS" } else { "❌ FAIL" }.to_string(),
        ]);
    }
    table
}

fn print_samples(outcome: &CheckOutcome) {
    println!("   ➜ {} [{}]", outcome.name, outcome.columns.join(", "));
    for row in outcome.violations.iter().take(SAMPLE_ROWS) {
        let cells: Vec<&str> = row
            .iter()
            .map(|c| c.as_deref().unwrap_or("NULL"))
            .collect();
        println!("      {}", cells.join(" | "));
    }
    if outcome.violations.len() > SAMPLE_ROWS {
        println!("      … {} more", outcome.violations.len() - SAMPLE_ROWS);
    }
}
