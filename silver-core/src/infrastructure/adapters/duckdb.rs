// silver-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use duckdb::types::{ToSql, ToSqlOutput};
use duckdb::{Config, Connection, params, params_from_iter};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// Imports Hexagonaux
use crate::domain::schema::RawRow;
use crate::domain::value::Value;
use crate::error::SilverError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::connector::{ColumnSchema, Connector, TableRef};

pub struct DuckDBConnector {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDBConnector {
    pub fn new(db_path: &str) -> Result<Self, InfrastructureError> {
        let config = Config::default();

        let conn = if db_path == ":memory:" {
            Connection::open_in_memory_with_flags(config)?
        } else {
            Connection::open_with_flags(db_path, config)?
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, InfrastructureError> {
        Self::new(":memory:")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SilverError> {
        self.conn
            .lock()
            .map_err(|_| SilverError::Infrastructure(DatabaseError::Poisoned.into()))
    }
}

fn db_err(e: duckdb::Error) -> SilverError {
    SilverError::Infrastructure(InfrastructureError::Database(DatabaseError::DuckDB(e)))
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null => Ok(ToSqlOutput::Owned(duckdb::types::Value::Null)),
            Value::Int(i) => i.to_sql(),
            Value::Float(f) => f.to_sql(),
            Value::Date(d) => d.to_sql(),
            Value::Timestamp(ts) => ts.to_sql(),
            Value::Text(s) => s.to_sql(),
        }
    }
}

#[async_trait]
impl Connector for DuckDBConnector {
    async fn execute(&self, query: &str) -> Result<(), SilverError> {
        let conn = self.lock()?;
        conn.execute_batch(query).map_err(db_err)
    }

    async fn fetch_columns(&self, table: &TableRef) -> Result<Vec<ColumnSchema>, SilverError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
                 WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
            )
            .map_err(db_err)?;

        let columns = stmt
            .query_map(params![table.schema, table.name], |row| {
                Ok(ColumnSchema {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                    is_nullable: row.get::<_, String>(2)? == "YES",
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        if columns.is_empty() {
            return Err(InfrastructureError::TableNotFound(table.to_string()).into());
        }
        Ok(columns)
    }

    async fn register_source(&self, table: &TableRef, path: &str) -> Result<u64, SilverError> {
        let conn = self.lock()?;
        let query = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM read_csv('{}', header = true, all_varchar = true)",
            table,
            path.replace('\'', "''")
        );
        debug!(table = %table, path, "Registering CSV source");
        conn.execute_batch(&query).map_err(db_err)?;
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get::<_, u64>(0))
            .map_err(db_err)
    }

    async fn query_text_rows(&self, query: &str) -> Result<Vec<RawRow>, SilverError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(query).map_err(db_err)?;
        let mut rows = stmt.query([]).map_err(db_err)?;
        let width = rows.as_ref().map(|s| s.column_count()).unwrap_or(0);

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            let cells = (0..width)
                .map(|i| row.get::<_, Option<String>>(i))
                .collect::<Result<RawRow, _>>()
                .map_err(db_err)?;
            out.push(cells);
        }
        Ok(out)
    }

    async fn replace_table(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> Result<usize, SilverError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(&format!("DELETE FROM {}", table), [])
            .map_err(db_err)?;

        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        {
            let mut stmt = tx.prepare(&insert).map_err(db_err)?;
            for row in &rows {
                stmt.execute(params_from_iter(row.iter())).map_err(db_err)?;
            }
        }

        // Dropping `tx` without commit rolls back, leaving the previous extent in place.
        tx.commit().map_err(db_err)?;
        Ok(rows.len())
    }

    async fn count_rows(&self, table: &TableRef) -> Result<u64, SilverError> {
        let conn = self.lock()?;
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get::<_, u64>(0))
            .map_err(db_err)
    }

    fn engine_name(&self) -> &str {
        "duckdb"
    }
}
