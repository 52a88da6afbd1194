// silver-core/src/domain/transform/steps.rs
//
// Row-local operations. Each one sees a single record and never looks sideways.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;

use crate::domain::entity::EntityKind;
use crate::domain::error::DomainError;
use crate::domain::rules::lookup::normalize_code;
use crate::domain::rules::{Condition, FieldFix, Formula, LookupTable};
use crate::domain::value::{Record, Value};

/// Tolerance below which a value is considered equal to its formula.
const FORMULA_EPSILON: f64 = 1e-9;

pub(crate) enum CompiledFix {
    Trim(String),
    DefaultIfNull(String, Value),
    StripPattern(String, Regex),
    SplitKey {
        field: String,
        category_field: String,
        category_len: usize,
        separator: char,
        replacement: char,
    },
    ParseCompactDate(String),
}

impl CompiledFix {
    pub(crate) fn compile(fix: &FieldFix) -> Result<Self, String> {
        Ok(match fix {
            FieldFix::Trim { field } => Self::Trim(field.clone()),
            FieldFix::DefaultIfNull { field, value } => Self::DefaultIfNull(field.clone(), value.clone()),
            FieldFix::StripPattern { field, pattern } => {
                let re = Regex::new(pattern)
                    .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;
                Self::StripPattern(field.clone(), re)
            }
            FieldFix::SplitKey {
                field,
                category_field,
                category_len,
                separator,
                replacement,
            } => Self::SplitKey {
                field: field.clone(),
                category_field: category_field.clone(),
                category_len: *category_len,
                separator: *separator,
                replacement: *replacement,
            },
            FieldFix::ParseCompactDate { field } => Self::ParseCompactDate(field.clone()),
        })
    }

    fn apply(&self, record: &mut Record) -> Result<(), String> {
        match self {
            Self::Trim(field) => {
                let value = text_of(field, record.take(field))?
                    .map(|s| Value::text(s.trim()))
                    .unwrap_or_default();
                record.set(field.as_str(), value);
            }
            Self::DefaultIfNull(field, default) => {
                if record.get(field).is_null() {
                    record.set(field.as_str(), default.clone());
                }
            }
            Self::StripPattern(field, re) => {
                let value = text_of(field, record.take(field))?
                    .map(|s| Value::text(re.replace_all(&s, "")))
                    .unwrap_or_default();
                record.set(field.as_str(), value);
            }
            Self::SplitKey {
                field,
                category_field,
                category_len,
                separator,
                replacement,
            } => {
                let (category, key) = match text_of(field, record.take(field))? {
                    None => (Value::Null, Value::Null),
                    Some(raw) => {
                        let category: String = raw
                            .chars()
                            .take(*category_len)
                            .map(|c| if c == *separator { *replacement } else { c })
                            .collect();
                        let key: String = raw.chars().skip(category_len + 1).collect();
                        (Value::text(category), Value::text(key))
                    }
                };
                record.set(category_field.as_str(), category);
                record.set(field.as_str(), key);
            }
            Self::ParseCompactDate(field) => {
                let parsed = parse_compact_date(record.get(field));
                record.set(field.as_str(), parsed);
            }
        }
        Ok(())
    }
}

fn text_of(field: &str, value: Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(format!(
            "field '{}' holds a {} value, expected text",
            field,
            other.type_name()
        )),
    }
}

/// `20240131` → 2024-01-31. Zero, negative, wrong width or impossible dates give NULL.
/// Compact dates arrive as integers; any other cell type gives NULL as well.
pub(crate) fn parse_compact_date(value: &Value) -> Value {
    let n = match value {
        Value::Int(i) => *i,
        _ => return Value::Null,
    };
    if n <= 0 {
        return Value::Null;
    }
    let digits = n.to_string();
    if digits.len() != 8 {
        return Value::Null;
    }
    NaiveDate::parse_from_str(&digits, "%Y%m%d")
        .map(Value::Date)
        .unwrap_or_default()
}

pub(crate) enum RowOp {
    Cleanse(Vec<CompiledFix>),
    Normalize {
        field: String,
        index: HashMap<String, String>,
        sentinel: String,
    },
    Compute {
        target: String,
        formula: Formula,
    },
    Substitute {
        field: String,
        when: Vec<Condition>,
        recompute: Option<Formula>,
        as_of: NaiveDate,
    },
}

impl RowOp {
    pub(crate) fn normalize(field: &str, table: &LookupTable) -> Result<Self, String> {
        Ok(Self::Normalize {
            field: field.to_string(),
            index: table.index()?,
            sentinel: table.sentinel.clone(),
        })
    }
}

pub(crate) struct RowStep {
    pub(crate) entity: EntityKind,
    pub(crate) label: String,
    pub(crate) op: RowOp,
}

impl RowStep {
    pub(crate) fn apply(&self, mut record: Record) -> Result<Record, DomainError> {
        match &self.op {
            RowOp::Cleanse(fixes) => {
                for fix in fixes {
                    fix.apply(&mut record).map_err(|r| self.fail(r))?;
                }
            }
            RowOp::Normalize {
                field,
                index,
                sentinel,
            } => {
                let code = match record.get(field) {
                    Value::Null => None,
                    Value::Text(s) => Some(normalize_code(s)),
                    other => Some(normalize_code(&other.to_string())),
                };
                let label = code
                    .and_then(|c| index.get(&c))
                    .unwrap_or(sentinel)
                    .clone();
                record.set(field.as_str(), Value::Text(label));
            }
            RowOp::Compute { target, formula } => {
                let value = formula.eval(&record).map_err(|r| self.fail(r))?;
                record.set(target.as_str(), value.map(Value::Float).unwrap_or_default());
            }
            RowOp::Substitute {
                field,
                when,
                recompute,
                as_of,
            } => {
                let mut triggered = false;
                for condition in when {
                    if holds(condition, field, &record, *as_of).map_err(|r| self.fail(r))? {
                        triggered = true;
                        break;
                    }
                }
                if triggered {
                    let replacement = match recompute {
                        Some(formula) => formula
                            .eval(&record)
                            .map_err(|r| self.fail(r))?
                            .map(Value::Float)
                            .unwrap_or_default(),
                        None => Value::Null,
                    };
                    record.set(field.as_str(), replacement);
                }
            }
        }
        Ok(record)
    }

    fn fail(&self, reason: String) -> DomainError {
        DomainError::rule(self.entity, &self.label, reason)
    }
}

/// Whether `condition` holds for `field`. NULL operands make a comparison unknown, i.e. false.
fn holds(condition: &Condition, field: &str, record: &Record, as_of: NaiveDate) -> Result<bool, String> {
    let current = record.get(field);
    match condition {
        Condition::Missing => Ok(current.is_null()),
        Condition::NonPositive => match current {
            Value::Null => Ok(false),
            v => v.as_f64().map(|x| x <= 0.0).ok_or_else(|| {
                format!("field '{}' holds a {} value, not a number", field, v.type_name())
            }),
        },
        Condition::InFuture => match current {
            Value::Null => Ok(false),
            v => v.as_date().map(|d| d > as_of).ok_or_else(|| {
                format!("field '{}' holds a {} value, not a date", field, v.type_name())
            }),
        },
        Condition::DiffersFrom { formula } => {
            let expected = formula.eval(record)?;
            Ok(match (current.as_f64(), expected) {
                (Some(actual), Some(expected)) => (actual - expected).abs() > FORMULA_EPSILON,
                _ => false,
            })
        }
    }
}
