// silver-core/src/domain/quality.rs

//! Post-load invariant checks.
//!
//! Every check is a query returning the violating rows of one silver table.
//! An empty result is a pass. The suite is derived from the rule catalog so the
//! closed label sets and version chains checked here are the ones the
//! evaluator produces.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::entity::EntityKind;
use crate::domain::project::QualitySettings;
use crate::domain::rules::{Derivation, RuleCatalog, RuleStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A cleansed-layer invariant.
    Error,
    /// A diagnostic on data the rules do not repair.
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckKind {
    NotNull { columns: Vec<String> },
    Unique { columns: Vec<String> },
    AllowedValues { column: String, values: BTreeSet<String> },
    Trimmed { column: String },
    NonNegative { column: String },
    Positive { column: String },
    DateOrder { earlier: String, later: String },
    /// `|total - quantity * price| <= tolerance`, NULLs included as violations.
    Formula {
        total: String,
        quantity: String,
        price: String,
        tolerance: f64,
    },
    NotInFuture { column: String },
    NotBefore { column: String, floor: NaiveDate },
    VersionChain {
        partition_by: Vec<String>,
        start: String,
        end: String,
        offset_days: i64,
        open_ended: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityCheck {
    pub name: String,
    pub entity: EntityKind,
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: CheckKind,
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn push_unique(columns: &mut Vec<String>, column: &str) {
    if !columns.iter().any(|existing| existing == column) {
        columns.push(column.to_string());
    }
}

fn select_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("CAST({} AS VARCHAR) AS {}", quote(c), quote(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

impl QualityCheck {
    fn new(entity: EntityKind, severity: Severity, kind: CheckKind) -> Self {
        let name = match &kind {
            CheckKind::NotNull { columns } => format!("not_null({})", columns.join(", ")),
            CheckKind::Unique { columns } => format!("unique({})", columns.join(", ")),
            CheckKind::AllowedValues { column, .. } => format!("allowed_values({})", column),
            CheckKind::Trimmed { column } => format!("trimmed({})", column),
            CheckKind::NonNegative { column } => format!("non_negative({})", column),
            CheckKind::Positive { column } => format!("positive({})", column),
            CheckKind::DateOrder { earlier, later } => format!("date_order({} <= {})", earlier, later),
            CheckKind::Formula {
                total,
                quantity,
                price,
                ..
            } => format!("formula({} = {} * {})", total, quantity, price),
            CheckKind::NotInFuture { column } => format!("not_in_future({})", column),
            CheckKind::NotBefore { column, floor } => format!("not_before({}, {})", column, floor),
            CheckKind::VersionChain { end, .. } => format!("version_chain({})", end),
        };
        Self {
            name: format!("{}.{}", entity, name),
            entity,
            severity,
            kind,
        }
    }

    /// Columns the check reports, key first. Uniqueness adds an `occurrences` count.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        if let CheckKind::Unique { columns: key } = &self.kind {
            for c in key {
                push_unique(&mut columns, c);
            }
            push_unique(&mut columns, "occurrences");
            return columns;
        }
        for c in self.entity.cleansed_schema().key {
            push_unique(&mut columns, c);
        }
        let involved: Vec<&String> = match &self.kind {
            CheckKind::NotNull { columns: cols } => cols.iter().collect(),
            CheckKind::Unique { .. } => Vec::new(),
            CheckKind::AllowedValues { column, .. }
            | CheckKind::Trimmed { column }
            | CheckKind::NonNegative { column }
            | CheckKind::Positive { column }
            | CheckKind::NotInFuture { column }
            | CheckKind::NotBefore { column, .. } => vec![column],
            CheckKind::DateOrder { earlier, later } => vec![earlier, later],
            CheckKind::Formula {
                total,
                quantity,
                price,
                ..
            } => vec![total, quantity, price],
            CheckKind::VersionChain {
                partition_by,
                start,
                end,
                ..
            } => partition_by.iter().chain([start, end]).collect(),
        };
        for c in involved {
            push_unique(&mut columns, c);
        }
        columns
    }

    /// Renders the violation query against `table` (already qualified and quoted).
    ///
    /// Every reported column is cast to text and rows come back in a stable order.
    pub fn sql(&self, table: &str) -> String {
        let columns = self.columns();
        let order_by = (1..=columns.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let filter = match &self.kind {
            CheckKind::Unique { columns: key } => {
                let quoted: Vec<String> = key.iter().map(|c| quote(c)).collect();
                let not_null = quoted
                    .iter()
                    .map(|c| format!("{} IS NOT NULL", c))
                    .collect::<Vec<_>>()
                    .join(" AND ");
                return format!(
                    "SELECT {}, CAST(COUNT(*) AS VARCHAR) AS \"occurrences\" FROM {} WHERE {} GROUP BY {} HAVING COUNT(*) > 1 ORDER BY {}",
                    select_list(key),
                    table,
                    not_null,
                    quoted.join(", "),
                    order_by
                );
            }
            CheckKind::VersionChain {
                partition_by,
                start,
                end,
                offset_days,
                open_ended,
            } => {
                // Versions sharing a start date chain in end-date order.
                let window = format!(
                    "OVER (PARTITION BY {} ORDER BY {} ASC NULLS FIRST, {} ASC NULLS FIRST)",
                    partition_by.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
                    quote(start),
                    quote(end)
                );
                return format!(
                    "SELECT {} FROM (SELECT *, LEAD({}) {w} AS \"__next_start\", LEAD(1) {w} AS \"__has_next\" FROM {}) \
                     WHERE (\"__has_next\" IS NULL AND {e} IS DISTINCT FROM DATE {}) \
                     OR (\"__has_next\" IS NOT NULL AND {e} IS DISTINCT FROM CAST(\"__next_start\" + ({}) AS DATE)) \
                     ORDER BY {}",
                    select_list(&columns),
                    quote(start),
                    table,
                    literal(&open_ended.to_string()),
                    offset_days,
                    order_by,
                    w = window,
                    e = quote(end),
                );
            }
            CheckKind::NotNull { columns: cols } => cols
                .iter()
                .map(|c| format!("{} IS NULL", quote(c)))
                .collect::<Vec<_>>()
                .join(" OR "),
            CheckKind::AllowedValues { column, values } => format!(
                "{c} IS NULL OR {c} NOT IN ({})",
                values.iter().map(|v| literal(v)).collect::<Vec<_>>().join(", "),
                c = quote(column)
            ),
            CheckKind::Trimmed { column } => format!("{c} <> TRIM({c})", c = quote(column)),
            CheckKind::NonNegative { column } => format!("{c} IS NULL OR {c} < 0", c = quote(column)),
            CheckKind::Positive { column } => format!("{c} IS NULL OR {c} <= 0", c = quote(column)),
            CheckKind::DateOrder { earlier, later } => {
                format!("{} > {}", quote(earlier), quote(later))
            }
            CheckKind::Formula {
                total,
                quantity,
                price,
                tolerance,
            } => format!(
                "{t} IS NULL OR {q} IS NULL OR {p} IS NULL OR ABS({t} - {q} * {p}) > {}",
                tolerance,
                t = quote(total),
                q = quote(quantity),
                p = quote(price)
            ),
            CheckKind::NotInFuture { column } => format!("{} > CURRENT_DATE", quote(column)),
            CheckKind::NotBefore { column, floor } => {
                format!("{} < DATE {}", quote(column), literal(&floor.to_string()))
            }
        };

        format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            select_list(&columns),
            table,
            filter,
            order_by
        )
    }
}

/// Builds the suite for `entities` from the rule catalog and the quality settings.
pub fn builtin_suite(
    catalog: &RuleCatalog,
    settings: &QualitySettings,
    entities: &[EntityKind],
) -> Vec<QualityCheck> {
    let col = |s: &str| s.to_string();
    let mut checks = Vec::new();

    for &entity in entities {
        let key: Vec<String> = entity.cleansed_schema().key.iter().map(|k| col(k)).collect();
        checks.push(QualityCheck::new(
            entity,
            Severity::Error,
            CheckKind::NotNull { columns: key.clone() },
        ));
        checks.push(QualityCheck::new(
            entity,
            Severity::Error,
            CheckKind::Unique { columns: key },
        ));

        for step in catalog.rules_for(entity) {
            match step {
                RuleStep::Normalize { field, .. } => {
                    if let Some(values) = catalog.closed_domain(entity, field) {
                        let kind = CheckKind::AllowedValues {
                            column: field.clone(),
                            values,
                        };
                        checks.push(QualityCheck::new(entity, Severity::Error, kind));
                    }
                }
                RuleStep::Derive {
                    derivation:
                        Derivation::Lead {
                            target,
                            partition_by,
                            order_by,
                            offset_days,
                            open_ended,
                        },
                } => {
                    let kind = CheckKind::VersionChain {
                        partition_by: partition_by.clone(),
                        start: order_by.clone(),
                        end: target.clone(),
                        offset_days: *offset_days,
                        open_ended: *open_ended,
                    };
                    checks.push(QualityCheck::new(entity, Severity::Error, kind));
                }
                _ => {}
            }
        }

        match entity {
            EntityKind::Customer => {
                for name in ["cst_firstname", "cst_lastname"] {
                    checks.push(QualityCheck::new(
                        entity,
                        Severity::Warn,
                        CheckKind::Trimmed { column: col(name) },
                    ));
                }
            }
            EntityKind::Product => {
                checks.push(QualityCheck::new(
                    entity,
                    Severity::Error,
                    CheckKind::NonNegative {
                        column: col("prd_cost"),
                    },
                ));
                checks.push(QualityCheck::new(
                    entity,
                    Severity::Error,
                    CheckKind::DateOrder {
                        earlier: col("prd_start_dt"),
                        later: col("prd_end_dt"),
                    },
                ));
            }
            EntityKind::Sales => {
                for later in ["sls_ship_dt", "sls_due_dt"] {
                    checks.push(QualityCheck::new(
                        entity,
                        Severity::Error,
                        CheckKind::DateOrder {
                            earlier: col("sls_order_dt"),
                            later: col(later),
                        },
                    ));
                }
                checks.push(QualityCheck::new(
                    entity,
                    Severity::Error,
                    CheckKind::Formula {
                        total: col("sls_sales"),
                        quantity: col("sls_quantity"),
                        price: col("sls_price"),
                        tolerance: settings.tolerance,
                    },
                ));
                for name in ["sls_sales", "sls_quantity", "sls_price"] {
                    checks.push(QualityCheck::new(
                        entity,
                        Severity::Warn,
                        CheckKind::Positive { column: col(name) },
                    ));
                }
            }
            EntityKind::CustomerDemographic => {
                checks.push(QualityCheck::new(
                    entity,
                    Severity::Error,
                    CheckKind::NotInFuture {
                        column: col("bdate"),
                    },
                ));
                checks.push(QualityCheck::new(
                    entity,
                    Severity::Warn,
                    CheckKind::NotBefore {
                        column: col("bdate"),
                        floor: settings.birthdate_floor,
                    },
                ));
            }
            EntityKind::Location | EntityKind::ProductCategory => {}
        }
    }
    checks
}

/// Result of one executed check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub entity: EntityKind,
    pub table: String,
    pub severity: Severity,
    pub columns: Vec<String>,
    pub violations: Vec<Vec<Option<String>>>,
    pub duration_ms: u128,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub generated_at: DateTime<Utc>,
    pub total_duration_ms: u128,
    pub outcomes: Vec<CheckOutcome>,
}

impl QualityReport {
    pub fn failed(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn is_clean(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn violation_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.violations.len()).sum()
    }
}
