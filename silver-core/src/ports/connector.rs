// silver-core/src/ports/connector.rs

// What the engine needs from the warehouse, without knowing which engine answers.

use async_trait::async_trait;
use std::fmt;

use crate::domain::entity::EntityKind;
use crate::domain::project::WarehouseLayout;
use crate::domain::schema::RawRow;
use crate::domain::value::Value;
use crate::error::SilverError;

// Struct simple pour décrire une colonne (indépendant de la DB)
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// A schema-qualified table. Displays quoted, ready to splice into SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
        }
    }

    pub fn bronze(layout: &WarehouseLayout, entity: EntityKind) -> Self {
        Self::new(&layout.bronze, entity.table_name())
    }

    pub fn silver(layout: &WarehouseLayout, entity: EntityKind) -> Self {
        Self::new(&layout.silver, entity.table_name())
    }

    /// Accepts `schema.table` or a bare table name in `default_schema`.
    pub fn parse(raw: &str, default_schema: &str) -> Self {
        let unquote = |s: &str| s.trim().trim_matches('"').to_string();
        match raw.split_once('.') {
            Some((schema, name)) => Self {
                schema: unquote(schema),
                name: unquote(name),
            },
            None => Self {
                schema: default_schema.to_string(),
                name: unquote(raw),
            },
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\".\"{}\"",
            self.schema.replace('"', "\"\""),
            self.name.replace('"', "\"\"")
        )
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn execute(&self, query: &str) -> Result<(), SilverError>;

    /// Columns of `table` in ordinal order. A missing table is `TableNotFound`.
    async fn fetch_columns(&self, table: &TableRef) -> Result<Vec<ColumnSchema>, SilverError>;

    /// Loads a CSV file into `table` with every column as text. Returns the row count.
    async fn register_source(&self, table: &TableRef, path: &str) -> Result<u64, SilverError>;

    /// Runs a query whose columns are all text, returning positional cells.
    async fn query_text_rows(&self, query: &str) -> Result<Vec<RawRow>, SilverError>;

    /// Empties `table` and inserts `rows` in one transaction.
    async fn replace_table(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> Result<usize, SilverError>;

    async fn count_rows(&self, table: &TableRef) -> Result<u64, SilverError>;

    fn engine_name(&self) -> &str;
}
