// silver-core/src/domain/schema.rs

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::entity::EntityKind;
use crate::domain::error::DomainError;
use crate::domain::value::{Record, Value};

/// Raw bronze rows arrive as positional text cells.
pub type RawRow = Vec<Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Date,
    Timestamp,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Int => "BIGINT",
            Self::Float => "DOUBLE",
            Self::Text => "VARCHAR",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
        }
    }

    /// Parses one bronze cell. Blank cells are NULL except for text, which keeps them.
    pub fn parse(&self, cell: Option<&str>) -> Result<Value, String> {
        let Some(raw) = cell else {
            return Ok(Value::Null);
        };
        if *self == Self::Text {
            return Ok(Value::text(raw));
        }
        let s = raw.trim();
        if s.is_empty() {
            return Ok(Value::Null);
        }
        match self {
            Self::Int => parse_int(s).map(Value::Int),
            Self::Float => s
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float)
                .ok_or_else(|| format!("'{}' is not a number", s)),
            Self::Date => parse_date(s).map(Value::Date),
            Self::Timestamp => parse_timestamp(s).map(Value::Timestamp),
            Self::Text => Ok(Value::text(raw)),
        }
    }

    /// Coerces an evaluated value into the declared cleansed column type.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (Self::Int, Value::Float(f)) if f.fract() == 0.0 => Ok(Value::Int(f as i64)),
            (Self::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (Self::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Self::Text, Value::Text(s)) => Ok(Value::Text(s)),
            (Self::Date, Value::Date(d)) => Ok(Value::Date(d)),
            (Self::Date, Value::Timestamp(ts)) => Ok(Value::Date(ts.date())),
            (Self::Timestamp, Value::Timestamp(ts)) => Ok(Value::Timestamp(ts)),
            (Self::Timestamp, Value::Date(d)) => Ok(Value::Timestamp(d.and_time(Default::default()))),
            (ty, other) => Err(format!(
                "cannot store {} value '{}' as {:?}",
                other.type_name(),
                other,
                ty
            )),
        }
    }
}

fn parse_int(s: &str) -> Result<i64, String> {
    if let Ok(i) = s.parse::<i64>() {
        return Ok(i);
    }
    // Spreadsheet exports like "3.0" are accepted, "3.5" is not.
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(format!("'{}' is not an integer", s)),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    parse_timestamp(s)
        .map(|ts| ts.date())
        .map_err(|_| format!("'{}' is not a date", s))
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(Default::default()))
        })
        .ok_or_else(|| format!("'{}' is not a timestamp", s))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef { name, ty }
}

/// Positional column layout of one extent, plus the columns forming its key.
#[derive(Debug, PartialEq, Eq)]
pub struct EntitySchema {
    pub columns: &'static [ColumnDef],
    pub key: &'static [&'static str],
}

impl EntitySchema {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    fn key_of(&self, row: &RawRow) -> Option<String> {
        let parts: Vec<&str> = self
            .key
            .iter()
            .filter_map(|k| self.columns.iter().position(|c| c.name == *k))
            .filter_map(|idx| row.get(idx).and_then(|cell| cell.as_deref()))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("|"))
        }
    }

    /// Types a raw row. Any arity or cell failure rejects the whole record.
    pub fn parse_row(&self, entity: EntityKind, row: RawRow) -> Result<Record, DomainError> {
        if row.len() != self.columns.len() {
            return Err(DomainError::EntityParse {
                entity,
                key: self.key_of(&row),
                reason: format!(
                    "expected {} columns, found {}",
                    self.columns.len(),
                    row.len()
                ),
            });
        }
        let mut record = Record::new();
        for (def, cell) in self.columns.iter().zip(row.iter()) {
            let value = def.ty.parse(cell.as_deref()).map_err(|reason| {
                DomainError::EntityParse {
                    entity,
                    key: self.key_of(&row),
                    reason: format!("column '{}': {}", def.name, reason),
                }
            })?;
            record.set(def.name, value);
        }
        Ok(record)
    }

    /// Projects an evaluated record onto this layout, in column order.
    pub fn project(&self, entity: EntityKind, mut record: Record) -> Result<Record, DomainError> {
        let mut out = Record::new();
        for def in self.columns {
            let value = def
                .ty
                .coerce(record.take(def.name))
                .map_err(|reason| DomainError::RuleEvaluation {
                    entity,
                    step: "projection".to_string(),
                    reason: format!("column '{}': {}", def.name, reason),
                })?;
            out.set(def.name, value);
        }
        Ok(out)
    }

    /// Values in column order, ready for an INSERT.
    pub fn to_row(&self, record: &Record) -> Vec<Value> {
        self.columns
            .iter()
            .map(|c| record.get(c.name).clone())
            .collect()
    }
}

use ColumnType::{Date, Float, Int, Text};

static RAW_CUSTOMER: EntitySchema = EntitySchema {
    columns: &[
        col("cst_id", Int),
        col("cst_key", Text),
        col("cst_firstname", Text),
        col("cst_lastname", Text),
        col("cst_marital_status", Text),
        col("cst_gndr", Text),
        col("cst_create_date", Date),
    ],
    key: &["cst_id"],
};

static RAW_PRODUCT: EntitySchema = EntitySchema {
    columns: &[
        col("prd_id", Int),
        col("prd_key", Text),
        col("prd_nm", Text),
        col("prd_cost", Int),
        col("prd_line", Text),
        col("prd_start_dt", Date),
        col("prd_end_dt", Date),
    ],
    key: &["prd_id"],
};

static CLEANSED_PRODUCT: EntitySchema = EntitySchema {
    columns: &[
        col("prd_id", Int),
        col("cat_id", Text),
        col("prd_key", Text),
        col("prd_nm", Text),
        col("prd_cost", Int),
        col("prd_line", Text),
        col("prd_start_dt", Date),
        col("prd_end_dt", Date),
    ],
    key: &["prd_id"],
};

static RAW_SALES: EntitySchema = EntitySchema {
    columns: &[
        col("sls_ord_num", Text),
        col("sls_prd_key", Text),
        col("sls_cust_id", Int),
        col("sls_order_dt", Int),
        col("sls_ship_dt", Int),
        col("sls_due_dt", Int),
        col("sls_sales", Float),
        col("sls_quantity", Int),
        col("sls_price", Float),
    ],
    key: &["sls_ord_num", "sls_prd_key"],
};

static CLEANSED_SALES: EntitySchema = EntitySchema {
    columns: &[
        col("sls_ord_num", Text),
        col("sls_prd_key", Text),
        col("sls_cust_id", Int),
        col("sls_order_dt", Date),
        col("sls_ship_dt", Date),
        col("sls_due_dt", Date),
        col("sls_sales", Float),
        col("sls_quantity", Int),
        col("sls_price", Float),
    ],
    key: &["sls_ord_num", "sls_prd_key"],
};

static LOCATION: EntitySchema = EntitySchema {
    columns: &[col("cid", Text), col("cntry", Text)],
    key: &["cid"],
};

static DEMOGRAPHIC: EntitySchema = EntitySchema {
    columns: &[col("cid", Text), col("bdate", Date), col("gen", Text)],
    key: &["cid"],
};

static CATEGORY: EntitySchema = EntitySchema {
    columns: &[
        col("id", Text),
        col("cat", Text),
        col("subcat", Text),
        col("maintenance", Text),
    ],
    key: &["id"],
};

pub fn raw(entity: EntityKind) -> &'static EntitySchema {
    match entity {
        EntityKind::Customer => &RAW_CUSTOMER,
        EntityKind::Product => &RAW_PRODUCT,
        EntityKind::Sales => &RAW_SALES,
        EntityKind::Location => &LOCATION,
        EntityKind::CustomerDemographic => &DEMOGRAPHIC,
        EntityKind::ProductCategory => &CATEGORY,
    }
}

pub fn cleansed(entity: EntityKind) -> &'static EntitySchema {
    match entity {
        EntityKind::Customer => &RAW_CUSTOMER,
        EntityKind::Product => &CLEANSED_PRODUCT,
        EntityKind::Sales => &CLEANSED_SALES,
        EntityKind::Location => &LOCATION,
        EntityKind::CustomerDemographic => &DEMOGRAPHIC,
        EntityKind::ProductCategory => &CATEGORY,
    }
}

/// Column stamped on every silver row at load time.
pub const INGESTED_AT: &str = "ingested_at";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> RawRow {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_parse_customer_row() {
        let rec = raw(EntityKind::Customer)
            .parse_row(
                EntityKind::Customer,
                cells(&["7", "AW07", " Ann ", "Doe", "s", "F", "2024-01-01"]),
            )
            .unwrap();
        assert_eq!(rec.get("cst_id"), &Value::Int(7));
        assert_eq!(rec.get("cst_firstname"), &Value::text(" Ann "));
        assert_eq!(
            rec.get("cst_create_date"),
            &Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_wrong_arity_reports_key() {
        let err = raw(EntityKind::Customer)
            .parse_row(EntityKind::Customer, cells(&["7", "AW07"]))
            .unwrap_err();
        match err {
            DomainError::EntityParse { entity, key, .. } => {
                assert_eq!(entity, EntityKind::Customer);
                assert_eq!(key.as_deref(), Some("7"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_cell_type_is_parse_error() {
        let err = raw(EntityKind::Sales)
            .parse_row(
                EntityKind::Sales,
                cells(&["SO1", "BK-1", "x", "20240101", "20240105", "20240110", "10", "1", "10"]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("sls_cust_id"));
    }

    #[test]
    fn test_blank_numeric_cell_is_null_but_blank_text_is_kept() {
        assert_eq!(ColumnType::Int.parse(Some("  ")).unwrap(), Value::Null);
        assert_eq!(ColumnType::Text.parse(Some("")).unwrap(), Value::text(""));
        assert_eq!(ColumnType::Int.parse(Some("3.0")).unwrap(), Value::Int(3));
        assert!(ColumnType::Int.parse(Some("3.5")).is_err());
    }

    #[test]
    fn test_date_accepts_timestamp_text() {
        assert_eq!(
            ColumnType::Date.parse(Some("2003-07-01 00:00:00")).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2003, 7, 1).unwrap())
        );
    }

    #[test]
    fn test_projection_coerces_and_orders() {
        let rec = Record::new()
            .with("cid", Value::text("AW1"))
            .with("cntry", Value::text("Germany"))
            .with("scratch", Value::Int(1));
        let out = cleansed(EntityKind::Location)
            .project(EntityKind::Location, rec)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(!out.contains("scratch"));

        let bad = Record::new().with("cid", Value::Int(1));
        assert!(matches!(
            cleansed(EntityKind::Location).project(EntityKind::Location, bad),
            Err(DomainError::RuleEvaluation { .. })
        ));
    }
}
