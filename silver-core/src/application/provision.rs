// silver-core/src/application/provision.rs

use tracing::{debug, info, instrument};

use crate::domain::entity::EntityKind;
use crate::domain::project::WarehouseLayout;
use crate::domain::schema::INGESTED_AT;
use crate::error::SilverError;
use crate::ports::connector::{Connector, TableRef};

/// `CREATE TABLE IF NOT EXISTS` for the silver extent of `entity`.
///
/// Columns follow the cleansed layout, then the load timestamp.
pub fn silver_table_ddl(layout: &WarehouseLayout, entity: EntityKind) -> String {
    let columns: Vec<String> = entity
        .cleansed_schema()
        .columns
        .iter()
        .map(|c| format!("\"{}\" {}", c.name, c.ty.sql_type()))
        .chain(std::iter::once(format!("\"{}\" TIMESTAMP", INGESTED_AT)))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        TableRef::silver(layout, entity),
        columns.join(", ")
    )
}

/// Creates both schemas and every silver table of `entities`. Safe to repeat.
#[instrument(skip_all, fields(engine = connector.engine_name()))]
pub async fn provision_warehouse(
    connector: &dyn Connector,
    layout: &WarehouseLayout,
    entities: &[EntityKind],
) -> Result<Vec<TableRef>, SilverError> {
    for schema in [&layout.bronze, &layout.silver] {
        connector
            .execute(&format!(
                "CREATE SCHEMA IF NOT EXISTS \"{}\"",
                schema.replace('"', "\"\"")
            ))
            .await?;
    }

    let mut tables = Vec::with_capacity(entities.len());
    for &entity in entities {
        let table = TableRef::silver(layout, entity);
        debug!(%entity, table = %table, "Provisioning silver table");
        connector
            .execute(&silver_table_ddl(layout, entity))
            .await
            .map_err(|e| SilverError::storage(table.to_string(), "provision", e))?;
        tables.push(table);
    }

    info!(tables = tables.len(), "Warehouse provisioned");
    Ok(tables)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::DuckDBConnector;

    #[test]
    fn test_silver_ddl() {
        let ddl = silver_table_ddl(&WarehouseLayout::default(), EntityKind::Location);
        insta::assert_snapshot!(
            ddl,
            @r#"CREATE TABLE IF NOT EXISTS "silver"."erp_loc_a101" ("cid" VARCHAR, "cntry" VARCHAR, "ingested_at" TIMESTAMP)"#
        );
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let connector = DuckDBConnector::in_memory().unwrap();
        let layout = WarehouseLayout::default();
        let entities = EntityKind::declared_order();

        provision_warehouse(&connector, &layout, &entities).await.unwrap();
        let tables = provision_warehouse(&connector, &layout, &entities).await.unwrap();
        assert_eq!(tables.len(), 6);

        let product = connector
            .fetch_columns(&TableRef::silver(&layout, EntityKind::Product))
            .await
            .unwrap();
        let names: Vec<&str> = product.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names[1], "cat_id");
        assert_eq!(names.last().copied(), Some("ingested_at"));
        assert_eq!(product[4].data_type, "BIGINT");
    }
}
