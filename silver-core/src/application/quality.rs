// silver-core/src/application/quality.rs

use chrono::Utc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::domain::project::{ProjectConfig, WarehouseLayout};
use crate::domain::quality::{CheckOutcome, QualityCheck, QualityReport, builtin_suite};
use crate::error::SilverError;
use crate::ports::connector::{Connector, TableRef};

/// The checks implied by the project's rules, settings and entity list.
pub fn project_suite(config: &ProjectConfig) -> Vec<QualityCheck> {
    builtin_suite(&config.rule_catalog(), &config.quality, &config.entities)
}

/// Runs every check and collects the violating rows.
///
/// Findings never make this fail. A check that cannot run at all (missing
/// table, engine error) aborts the suite with `ValidationExecution`.
#[instrument(skip_all, fields(checks = checks.len()))]
pub async fn run_quality_suite(
    connector: &dyn Connector,
    layout: &WarehouseLayout,
    checks: &[QualityCheck],
) -> Result<QualityReport, SilverError> {
    let started = Instant::now();
    let mut outcomes = Vec::with_capacity(checks.len());

    for check in checks {
        let table = TableRef::silver(layout, check.entity);
        let check_started = Instant::now();

        let violations = connector
            .query_text_rows(&check.sql(&table.to_string()))
            .await
            .map_err(|e| match e {
                SilverError::Infrastructure(source) => SilverError::ValidationExecution {
                    check: check.name.clone(),
                    source,
                },
                other => other,
            })?;

        let duration_ms = check_started.elapsed().as_millis();
        if violations.is_empty() {
            info!(check = %check.name, duration_ms = duration_ms as u64, "Check passed");
        } else {
            warn!(
                check = %check.name,
                severity = ?check.severity,
                violations = violations.len(),
                "Check found violations"
            );
        }

        outcomes.push(CheckOutcome {
            name: check.name.clone(),
            entity: check.entity,
            table: table.to_string(),
            severity: check.severity,
            columns: check.columns(),
            violations,
            duration_ms,
        });
    }

    let report = QualityReport {
        generated_at: Utc::now(),
        total_duration_ms: started.elapsed().as_millis(),
        outcomes,
    };
    info!(
        failed = report.failed().count(),
        violations = report.violation_count(),
        "Quality suite finished"
    );
    Ok(report)
}
