// silver-core/src/domain/rules/formula.rs

use serde::{Deserialize, Serialize};

use crate::domain::value::{Record, Value};

/// A field reference inside a formula, optionally taken as absolute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    pub field: String,
    #[serde(default)]
    pub absolute: bool,
}

impl Operand {
    pub fn field(name: &str) -> Self {
        Self {
            field: name.to_string(),
            absolute: false,
        }
    }

    pub fn abs(name: &str) -> Self {
        Self {
            field: name.to_string(),
            absolute: true,
        }
    }

    fn read(&self, record: &Record) -> Result<Option<f64>, String> {
        match record.get(&self.field) {
            Value::Null => Ok(None),
            v => v
                .as_f64()
                .map(|x| Some(if self.absolute { x.abs() } else { x }))
                .ok_or_else(|| {
                    format!("field '{}' holds a {} value, not a number", self.field, v.type_name())
                }),
        }
    }
}

/// Row-local arithmetic. NULL operands propagate, division by zero yields NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Formula {
    Multiply { left: Operand, right: Operand },
    Divide { numerator: Operand, denominator: Operand },
}

impl Formula {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Multiply { left, right } => vec![left.field.as_str(), right.field.as_str()],
            Self::Divide {
                numerator,
                denominator,
            } => vec![numerator.field.as_str(), denominator.field.as_str()],
        }
    }

    pub fn eval(&self, record: &Record) -> Result<Option<f64>, String> {
        match self {
            Self::Multiply { left, right } => {
                Ok(match (left.read(record)?, right.read(record)?) {
                    (Some(a), Some(b)) => Some(a * b),
                    _ => None,
                })
            }
            Self::Divide {
                numerator,
                denominator,
            } => Ok(match (numerator.read(record)?, denominator.read(record)?) {
                (Some(_), Some(d)) if d == 0.0 => None,
                (Some(n), Some(d)) => Some(n / d),
                _ => None,
            }),
        }
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |o: &Operand| {
            if o.absolute {
                format!("|{}|", o.field)
            } else {
                o.field.clone()
            }
        };
        match self {
            Self::Multiply { left, right } => write!(f, "{} * {}", show(left), show(right)),
            Self::Divide {
                numerator,
                denominator,
            } => write!(f, "{} / {}", show(numerator), show(denominator)),
        }
    }
}
