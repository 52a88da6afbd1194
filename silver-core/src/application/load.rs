// silver-core/src/application/load.rs

//! Full-refresh orchestrator.
//!
//! Entities run strictly in plan order. Each one is read from bronze, cleansed
//! and swapped into silver inside a single storage transaction. The first
//! failure aborts the batch; extents already replaced stay replaced.

use chrono::NaiveDateTime;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::domain::batch::BatchContext;
use crate::domain::entity::EntityKind;
use crate::domain::error::DomainError;
use crate::domain::project::WarehouseLayout;
use crate::domain::rules::{RuleCatalog, RuleStep};
use crate::domain::schema::{INGESTED_AT, RawRow};
use crate::domain::transform::{TransformContext, transform};
use crate::domain::value::{Record, Value};
use crate::error::SilverError;
use crate::ports::connector::{Connector, TableRef};

/// Row counts of one successful entity step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLoad {
    pub rows_read: usize,
    pub rows_written: usize,
}

/// A failed entity step: which phase broke, and why.
struct StepFailure {
    step: &'static str,
    error: SilverError,
}

impl StepFailure {
    fn at(step: &'static str) -> impl FnOnce(SilverError) -> Self {
        move |error| Self { step, error }
    }
}

/// Text projection of the bronze table, with a deterministic row order.
pub fn raw_snapshot_query(table: &TableRef, columns: &[String]) -> String {
    let select = columns
        .iter()
        .map(|c| {
            let quoted = format!("\"{}\"", c.replace('"', "\"\""));
            format!("CAST({} AS VARCHAR) AS {}", quoted, quoted)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {} ORDER BY ALL", select, table)
}

/// Runs every entity of `batch.plan` in order, updating `batch` as it goes.
///
/// On failure the batch ends `Aborted` and the returned error is
/// [`SilverError::BatchAborted`] carrying the entity, the step and the code.
#[instrument(skip_all, fields(batch_id = %batch.batch_id))]
pub async fn run_batch(
    connector: &dyn Connector,
    catalog: &RuleCatalog,
    layout: &WarehouseLayout,
    ctx: &TransformContext,
    batch: &mut BatchContext,
) -> Result<(), SilverError> {
    let loaded_at = batch.started_at.naive_utc();
    let plan = batch.plan.clone();

    for entity in plan {
        batch.begin(entity)?;
        let table = TableRef::silver(layout, entity);
        info!(%entity, table = %table, "Entity step started");
        let started = Instant::now();

        match load_entity(connector, catalog.rules_for(entity), layout, ctx, entity, loaded_at).await {
            Ok(load) => {
                let elapsed = started.elapsed();
                info!(
                    %entity,
                    rows_read = load.rows_read,
                    rows = load.rows_written,
                    duration_ms = elapsed.as_millis() as u64,
                    "Entity step succeeded"
                );
                batch.record_success(entity, load.rows_read, load.rows_written, elapsed);
            }
            Err(StepFailure { step, error: cause }) => {
                let elapsed = started.elapsed();
                let code = cause.code();
                error!(
                    %entity,
                    step,
                    code,
                    duration_ms = elapsed.as_millis() as u64,
                    cause = %cause,
                    "Entity step failed, aborting batch"
                );
                batch.abort(entity, step, code, cause.to_string(), elapsed)?;
                error!(
                    entities = batch.steps.len(),
                    rows = batch.rows_written(),
                    duration_ms = batch.total_duration_ms as u64,
                    "Batch aborted"
                );
                return Err(SilverError::BatchAborted {
                    entity,
                    step,
                    code,
                    source: Box::new(cause),
                });
            }
        }
    }

    batch.complete()?;
    info!(
        entities = batch.steps.len(),
        rows = batch.rows_written(),
        duration_ms = batch.total_duration_ms as u64,
        "Batch completed"
    );
    Ok(())
}

async fn load_entity(
    connector: &dyn Connector,
    rules: &[RuleStep],
    layout: &WarehouseLayout,
    ctx: &TransformContext,
    entity: EntityKind,
    loaded_at: NaiveDateTime,
) -> Result<EntityLoad, StepFailure> {
    // 1. Read
    let bronze = TableRef::bronze(layout, entity);
    let raw = read_snapshot(connector, &bronze)
        .await
        .map_err(|e| SilverError::storage(bronze.to_string(), "read", e))
        .map_err(StepFailure::at("read"))?;
    let rows_read = raw.len();

    // 2. Transform
    let records = cleanse(entity, rules, raw, ctx)
        .map_err(SilverError::from)
        .map_err(StepFailure::at("transform"))?;

    // 3. Replace
    let silver = TableRef::silver(layout, entity);
    let cleansed = entity.cleansed_schema();
    let mut columns: Vec<String> = cleansed.column_names().into_iter().map(String::from).collect();
    columns.push(INGESTED_AT.to_string());

    let rows: Vec<Vec<Value>> = records
        .iter()
        .map(|record| {
            let mut row = cleansed.to_row(record);
            row.push(Value::Timestamp(loaded_at));
            row
        })
        .collect();

    let rows_written = connector
        .replace_table(&silver, &columns, rows)
        .await
        .map_err(|e| SilverError::storage(silver.to_string(), "replace", e))
        .map_err(StepFailure::at("replace"))?;

    Ok(EntityLoad {
        rows_read,
        rows_written,
    })
}

async fn read_snapshot(connector: &dyn Connector, bronze: &TableRef) -> Result<Vec<RawRow>, SilverError> {
    let columns: Vec<String> = connector
        .fetch_columns(bronze)
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    connector.query_text_rows(&raw_snapshot_query(bronze, &columns)).await
}

fn cleanse(
    entity: EntityKind,
    rules: &[RuleStep],
    raw: Vec<RawRow>,
    ctx: &TransformContext,
) -> Result<Vec<Record>, DomainError> {
    transform(entity, rules, raw, ctx)?.collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::batch::BatchState;
    use crate::infrastructure::error::InfrastructureError;
    use crate::ports::connector::ColumnSchema;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    // --- MOCK CONNECTOR ---
    #[derive(Default)]
    struct MockConnector {
        bronze: HashMap<String, (Vec<&'static str>, Vec<RawRow>)>,
        written: Arc<Mutex<HashMap<String, Vec<Vec<Value>>>>>,
        executed_queries: Arc<Mutex<Vec<String>>>,
        fail_replace_on: Option<String>,
    }

    impl MockConnector {
        fn with_bronze(mut self, entity: EntityKind, columns: Vec<&'static str>, rows: &[&[&str]]) -> Self {
            let table = TableRef::bronze(&WarehouseLayout::default(), entity).to_string();
            let rows = rows
                .iter()
                .map(|r| r.iter().map(|c| Some(c.to_string())).collect())
                .collect();
            self.bronze.insert(table, (columns, rows));
            self
        }

        fn written(&self, entity: EntityKind) -> Option<Vec<Vec<Value>>> {
            let table = TableRef::silver(&WarehouseLayout::default(), entity).to_string();
            self.written.lock().unwrap().get(&table).cloned()
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn execute(&self, query: &str) -> Result<(), SilverError> {
            self.executed_queries.lock().unwrap().push(query.to_string());
            Ok(())
        }

        async fn fetch_columns(&self, table: &TableRef) -> Result<Vec<ColumnSchema>, SilverError> {
            let (columns, _) = self
                .bronze
                .get(&table.to_string())
                .ok_or_else(|| InfrastructureError::TableNotFound(table.to_string()))?;
            Ok(columns
                .iter()
                .map(|name| ColumnSchema {
                    name: name.to_string(),
                    data_type: "VARCHAR".into(),
                    is_nullable: true,
                })
                .collect())
        }

        async fn register_source(&self, _table: &TableRef, _path: &str) -> Result<u64, SilverError> {
            Ok(0)
        }

        async fn query_text_rows(&self, query: &str) -> Result<Vec<RawRow>, SilverError> {
            self.executed_queries.lock().unwrap().push(query.to_string());
            Ok(self
                .bronze
                .iter()
                .find(|(table, _)| query.contains(table.as_str()))
                .map(|(_, (_, rows))| rows.clone())
                .unwrap_or_default())
        }

        async fn replace_table(
            &self,
            table: &TableRef,
            _columns: &[String],
            rows: Vec<Vec<Value>>,
        ) -> Result<usize, SilverError> {
            if self.fail_replace_on.as_deref() == Some(table.name.as_str()) {
                return Err(InfrastructureError::Io(std::io::Error::other("disk full")).into());
            }
            let count = rows.len();
            self.written.lock().unwrap().insert(table.to_string(), rows);
            Ok(count)
        }

        async fn count_rows(&self, _table: &TableRef) -> Result<u64, SilverError> {
            Ok(0)
        }

        fn engine_name(&self) -> &str {
            "mock"
        }
    }

    const CUSTOMER_COLUMNS: [&str; 7] = [
        "cst_id",
        "cst_key",
        "cst_firstname",
        "cst_lastname",
        "cst_marital_status",
        "cst_gndr",
        "cst_create_date",
    ];

    fn ctx() -> TransformContext {
        TransformContext::new(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
    }

    fn base_connector() -> MockConnector {
        MockConnector::default()
            .with_bronze(
                EntityKind::Customer,
                CUSTOMER_COLUMNS.to_vec(),
                &[
                    &["7", "AW7", " Anne", "Smith ", "S", "F", "2024-01-01"],
                    &["7", "AW7", "Anne ", "Smith", "M", "F", "2024-06-01"],
                    &["8", "AW8", "Bo", "Lee", "", "", "2024-02-01"],
                ],
            )
            .with_bronze(
                EntityKind::Location,
                vec!["cid", "cntry"],
                &[&["AW-00011000", "DE "], &["AW-00011001", "Atlantis"]],
            )
    }

    async fn run(connector: &MockConnector, plan: Vec<EntityKind>) -> (BatchContext, Result<(), SilverError>) {
        let mut batch = BatchContext::new(plan);
        let result = run_batch(
            connector,
            &RuleCatalog::builtin(),
            &WarehouseLayout::default(),
            &ctx(),
            &mut batch,
        )
        .await;
        (batch, result)
    }

    #[test]
    fn test_raw_snapshot_query() {
        let query = raw_snapshot_query(
            &TableRef::new("bronze", "erp_loc_a101"),
            &["CID".to_string(), "CNTRY".to_string()],
        );
        assert_eq!(
            query,
            "SELECT CAST(\"CID\" AS VARCHAR) AS \"CID\", CAST(\"CNTRY\" AS VARCHAR) AS \"CNTRY\" \
             FROM \"bronze\".\"erp_loc_a101\" ORDER BY ALL"
        );
    }

    #[tokio::test]
    async fn test_full_refresh_happy_path() {
        let connector = base_connector();
        let (batch, result) = run(&connector, vec![EntityKind::Customer, EntityKind::Location]).await;

        result.unwrap();
        assert!(batch.succeeded());
        assert_eq!(batch.steps.len(), 2);
        assert_eq!(batch.steps[0].rows_read, 3);
        assert_eq!(batch.steps[0].rows_written, 2);

        let customers = connector.written(EntityKind::Customer).unwrap();
        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0][0], Value::Int(7));
        assert_eq!(customers[0][2], Value::text("Anne"));
        assert_eq!(customers[0][4], Value::text("Married"));
        assert_eq!(customers[1][4], Value::text("n/a"));
        // Cleansed columns, then the load timestamp.
        assert_eq!(customers[0].len(), CUSTOMER_COLUMNS.len() + 1);
        assert!(matches!(customers[0].last(), Some(Value::Timestamp(_))));

        let locations = connector.written(EntityKind::Location).unwrap();
        assert_eq!(locations[0][0], Value::text("AW00011000"));
        assert_eq!(locations[0][1], Value::text("Germany"));
        assert_eq!(locations[1][1], Value::text("n/a"));
    }

    #[tokio::test]
    async fn test_parse_failure_aborts_and_keeps_earlier_commits() {
        let connector = base_connector().with_bronze(
            EntityKind::Sales,
            vec!["sls_ord_num", "sls_prd_key"],
            &[&["SO1", "BK-1"]],
        );
        let plan = vec![EntityKind::Customer, EntityKind::Sales, EntityKind::Location];
        let (batch, result) = run(&connector, plan).await;

        let err = result.unwrap_err();
        match &err {
            SilverError::BatchAborted {
                entity, step, code, ..
            } => {
                assert_eq!(*entity, EntityKind::Sales);
                assert_eq!(*step, "transform");
                assert_eq!(*code, "entity_parse_error");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            batch.state,
            BatchState::Aborted {
                entity: EntityKind::Sales,
                ..
            }
        ));

        // Fail-fast: customer stays replaced, location is never read.
        assert!(connector.written(EntityKind::Customer).is_some());
        assert!(connector.written(EntityKind::Sales).is_none());
        let queries = connector.executed_queries.lock().unwrap();
        assert!(!queries.iter().any(|q| q.contains("erp_loc_a101")));
    }

    #[tokio::test]
    async fn test_replace_failure_is_a_storage_error() {
        let mut connector = base_connector();
        connector.fail_replace_on = Some("erp_loc_a101".into());
        let (batch, result) = run(&connector, vec![EntityKind::Customer, EntityKind::Location]).await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            SilverError::BatchAborted {
                step: "replace",
                code: "storage_error",
                ..
            }
        ));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(batch.steps.len(), 2);
        assert!(batch.finished_at.is_some());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_abort_logs_batch_summary() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut connector = base_connector();
        connector.fail_replace_on = Some("erp_loc_a101".into());
        let (_, result) = run(&connector, vec![EntityKind::Customer, EntityKind::Location]).await;
        assert!(result.is_err());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let summary = output
            .lines()
            .find(|line| line.contains("Batch aborted"))
            .unwrap_or_else(|| panic!("no summary line in:\n{output}"));
        assert!(summary.contains("ERROR"), "{summary}");
        assert!(summary.contains("entities=2"), "{summary}");
    }

    #[tokio::test]
    async fn test_missing_bronze_table_fails_at_read() {
        let connector = base_connector();
        let (_, result) = run(&connector, vec![EntityKind::ProductCategory]).await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            SilverError::BatchAborted {
                entity: EntityKind::ProductCategory,
                step: "read",
                ..
            }
        ));
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let connector = base_connector();
        run(&connector, vec![EntityKind::Customer]).await.1.unwrap();
        let first = connector.written(EntityKind::Customer).unwrap();
        run(&connector, vec![EntityKind::Customer]).await.1.unwrap();
        let second = connector.written(EntityKind::Customer).unwrap();

        let strip = |rows: Vec<Vec<Value>>| -> Vec<Vec<Value>> {
            rows.into_iter().map(|mut r| {
                r.pop();
                r
            }).collect()
        };
        assert_eq!(strip(first), strip(second));
    }
}
