// silver-core/src/domain/rules/mod.rs
//
// Rule sets are plain data: the evaluator is the only interpreter.

pub mod catalog;
pub mod formula;
pub mod lookup;

pub use catalog::RuleCatalog;
pub use formula::{Formula, Operand};
pub use lookup::{LookupEntry, LookupTable, NOT_AVAILABLE};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::value::Value;

/// One step of an entity's cleansing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RuleStep {
    /// Keeps the most recent row per key. Rows with a NULL key are dropped.
    Deduplicate { key: String, recency: String },
    Cleanse { fixes: Vec<FieldFix> },
    Normalize { field: String, table: LookupTable },
    Derive { derivation: Derivation },
    /// Validate-and-substitute.
    Substitute {
        field: String,
        when: Vec<Condition>,
        #[serde(default)]
        recompute: Option<Formula>,
    },
}

impl RuleStep {
    pub fn label(&self) -> String {
        match self {
            Self::Deduplicate { key, .. } => format!("deduplicate({})", key),
            Self::Cleanse { fixes } => {
                let fields: Vec<&str> = fixes.iter().map(|f| f.field()).collect();
                format!("cleanse({})", fields.join(", "))
            }
            Self::Normalize { field, .. } => format!("normalize({})", field),
            Self::Derive { derivation } => format!("derive({})", derivation.target()),
            Self::Substitute { field, .. } => format!("substitute({})", field),
        }
    }

    /// Fields the step reads.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::Deduplicate { key, recency } => vec![key.as_str(), recency.as_str()],
            Self::Cleanse { fixes } => fixes.iter().map(|f| f.field()).collect(),
            Self::Normalize { field, .. } => vec![field.as_str()],
            Self::Derive { derivation } => derivation.inputs(),
            Self::Substitute {
                field,
                when,
                recompute,
            } => {
                let mut fields = vec![field.as_str()];
                fields.extend(when.iter().flat_map(|c| c.fields()));
                if let Some(formula) = recompute {
                    fields.extend(formula.fields());
                }
                fields
            }
        }
    }

    /// Fields the step creates in addition to the ones it rewrites in place.
    pub fn outputs(&self) -> Vec<&str> {
        match self {
            Self::Cleanse { fixes } => fixes
                .iter()
                .filter_map(|f| match f {
                    FieldFix::SplitKey { category_field, .. } => Some(category_field.as_str()),
                    _ => None,
                })
                .collect(),
            Self::Derive { derivation } => vec![derivation.target()],
            _ => Vec::new(),
        }
    }
}

/// Per-field fixups applied row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fix", rename_all = "snake_case")]
pub enum FieldFix {
    Trim {
        field: String,
    },
    DefaultIfNull {
        field: String,
        value: Value,
    },
    /// Removes every match of a regular expression.
    StripPattern {
        field: String,
        pattern: String,
    },
    /// `CO-RF-FR-R92B` becomes category `CO_RF` and key `FR-R92B`.
    SplitKey {
        field: String,
        category_field: String,
        category_len: usize,
        #[serde(default = "default_separator")]
        separator: char,
        #[serde(default = "default_replacement")]
        replacement: char,
    },
    /// 8-digit `YYYYMMDD` integer into a calendar date; anything else becomes NULL.
    ParseCompactDate {
        field: String,
    },
}

fn default_separator() -> char {
    '-'
}

fn default_replacement() -> char {
    '_'
}

impl FieldFix {
    pub fn field(&self) -> &str {
        match self {
            Self::Trim { field }
            | Self::DefaultIfNull { field, .. }
            | Self::StripPattern { field, .. }
            | Self::SplitKey { field, .. }
            | Self::ParseCompactDate { field } => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derivation {
    /// Row-local arithmetic into `target`.
    Compute { target: String, formula: Formula },
    /// Next row's `order_by` date within the partition, shifted by `offset_days`.
    /// The last row of each partition receives `open_ended`.
    Lead {
        target: String,
        partition_by: Vec<String>,
        order_by: String,
        #[serde(default)]
        offset_days: i64,
        open_ended: NaiveDate,
    },
}

impl Derivation {
    pub fn target(&self) -> &str {
        match self {
            Self::Compute { target, .. } | Self::Lead { target, .. } => target,
        }
    }

    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::Compute { formula, .. } => formula.fields(),
            Self::Lead {
                partition_by,
                order_by,
                ..
            } => partition_by
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(order_by.as_str()))
                .collect(),
        }
    }
}

/// A business-rule violation that triggers substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Condition {
    Missing,
    NonPositive,
    /// A date strictly after the evaluation date.
    InFuture,
    /// Numeric value disagrees with the formula. Unknown when either side is NULL.
    DiffersFrom { formula: Formula },
}

impl Condition {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::DiffersFrom { formula } => formula.fields(),
            _ => Vec::new(),
        }
    }
}
