// silver-core/src/domain/transform/window.rs
//
// Cross-row operations: partition, sort, then scan neighbours.

use chrono::{Days, NaiveDate};
use std::cmp::Ordering;

use crate::domain::entity::EntityKind;
use crate::domain::error::DomainError;
use crate::domain::value::{Record, Value};

pub(crate) enum WindowOp {
    Deduplicate {
        key: String,
        recency: String,
    },
    Lead {
        target: String,
        partition_by: Vec<String>,
        order_by: String,
        offset_days: i64,
        open_ended: NaiveDate,
    },
}

pub(crate) struct WindowStep {
    pub(crate) entity: EntityKind,
    pub(crate) label: String,
    pub(crate) op: WindowOp,
}

impl WindowStep {
    pub(crate) fn apply(&self, rows: Vec<Record>) -> Result<Vec<Record>, DomainError> {
        match &self.op {
            WindowOp::Deduplicate { key, recency } => Ok(deduplicate(rows, key, recency)),
            WindowOp::Lead {
                target,
                partition_by,
                order_by,
                offset_days,
                open_ended,
            } => lead(rows, target, partition_by, order_by, *offset_days, *open_ended)
                .map_err(|reason| DomainError::rule(self.entity, &self.label, reason)),
        }
    }
}

/// Keeps the most recent row per key; output is ordered by key.
///
/// Equal recency is broken by the whole record in descending total order,
/// so the survivor never depends on input order.
pub(crate) fn deduplicate(rows: Vec<Record>, key: &str, recency: &str) -> Vec<Record> {
    let mut rows: Vec<Record> = rows.into_iter().filter(|r| !r.get(key).is_null()).collect();
    rows.sort_by(|a, b| {
        a.get(key)
            .cmp_total(b.get(key))
            .then_with(|| b.get(recency).cmp_total(a.get(recency)))
            .then_with(|| b.cmp_total(a))
    });
    rows.dedup_by(|later, first| later.get(key).cmp_total(first.get(key)) == Ordering::Equal);
    rows
}

fn cmp_partition(a: &Record, b: &Record, partition_by: &[String]) -> Ordering {
    partition_by
        .iter()
        .map(|f| a.get(f).cmp_total(b.get(f)))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn shift(date: NaiveDate, offset_days: i64) -> Option<NaiveDate> {
    let days = Days::new(offset_days.unsigned_abs());
    if offset_days >= 0 {
        date.checked_add_days(days)
    } else {
        date.checked_sub_days(days)
    }
}

/// Sets `target` to the next row's `order_by` date (shifted) within each partition.
pub(crate) fn lead(
    mut rows: Vec<Record>,
    target: &str,
    partition_by: &[String],
    order_by: &str,
    offset_days: i64,
    open_ended: NaiveDate,
) -> Result<Vec<Record>, String> {
    rows.sort_by(|a, b| {
        cmp_partition(a, b, partition_by)
            .then_with(|| a.get(order_by).cmp_total(b.get(order_by)))
            .then_with(|| a.cmp_total(b))
    });

    let mut out = Vec::with_capacity(rows.len());
    let mut iter = rows.into_iter().peekable();
    while let Some(mut current) = iter.next() {
        let derived = match iter.peek() {
            Some(next) if cmp_partition(&current, next, partition_by) == Ordering::Equal => {
                match next.get(order_by) {
                    Value::Null => Value::Null,
                    v => {
                        let start = v.as_date().ok_or_else(|| {
                            format!("field '{}' holds a {} value, not a date", order_by, v.type_name())
                        })?;
                        let end = shift(start, offset_days).ok_or_else(|| {
                            format!("shifting {} by {} days leaves the calendar", start, offset_days)
                        })?;
                        Value::Date(end)
                    }
                }
            }
            _ => Value::Date(open_ended),
        };
        current.set(target, derived);
        out.push(current);
    }
    Ok(out)
}
