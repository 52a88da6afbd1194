// silver-core/src/domain/rules/catalog.rs

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::{Condition, Derivation, FieldFix, Formula, LookupTable, Operand, RuleStep};
use crate::domain::entity::EntityKind;
use crate::domain::value::Value;

/// Far-future end date marking the current version of a product.
pub fn open_ended_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Entity type → ordered rule steps. The only place domain knowledge lives.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCatalog {
    rules: BTreeMap<EntityKind, Vec<RuleStep>>,
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleCatalog {
    pub fn builtin() -> Self {
        let rules = EntityKind::ALL
            .into_iter()
            .map(|entity| (entity, builtin_rules(entity)))
            .collect();
        Self { rules }
    }

    /// Replaces the rule set of every entity present in `overrides`.
    pub fn with_overrides(mut self, overrides: &BTreeMap<EntityKind, Vec<RuleStep>>) -> Self {
        for (entity, steps) in overrides {
            self.rules.insert(*entity, steps.clone());
        }
        self
    }

    /// Entities without a declared rule set pass through unchanged.
    pub fn rules_for(&self, entity: EntityKind) -> &[RuleStep] {
        self.rules.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Closed label set a normalized field can take, if the field is normalized.
    pub fn closed_domain(&self, entity: EntityKind, field: &str) -> Option<BTreeSet<String>> {
        self.rules_for(entity).iter().rev().find_map(|step| match step {
            RuleStep::Normalize { field: f, table } if f == field => Some(table.domain()),
            _ => None,
        })
    }

    /// Every `(entity, field)` that ends up normalized.
    pub fn normalized_fields(&self) -> Vec<(EntityKind, String)> {
        let mut out = Vec::new();
        for (entity, steps) in &self.rules {
            for step in steps {
                if let RuleStep::Normalize { field, .. } = step {
                    let pair = (*entity, field.clone());
                    if !out.contains(&pair) {
                        out.push(pair);
                    }
                }
            }
        }
        out
    }
}

fn trim(field: &str) -> FieldFix {
    FieldFix::Trim {
        field: field.to_string(),
    }
}

fn parse_compact_date(field: &str) -> FieldFix {
    FieldFix::ParseCompactDate {
        field: field.to_string(),
    }
}

fn normalize(field: &str, table: LookupTable) -> RuleStep {
    RuleStep::Normalize {
        field: field.to_string(),
        table,
    }
}

fn gender_table(long_forms: bool) -> LookupTable {
    if long_forms {
        LookupTable::new(&[(&["F", "FEMALE"], "Female"), (&["M", "MALE"], "Male")])
    } else {
        LookupTable::new(&[(&["F"], "Female"), (&["M"], "Male")])
    }
}

fn country_table() -> LookupTable {
    LookupTable::new(&[
        (&["DE"], "Germany"),
        (&["US", "USA"], "United States"),
        (&["AU"], "Australia"),
        (&["CA"], "Canada"),
        (&["FR"], "France"),
        (&["GB", "UK"], "United Kingdom"),
    ])
    .accepting_labels()
}

fn builtin_rules(entity: EntityKind) -> Vec<RuleStep> {
    match entity {
        EntityKind::Customer => vec![
            RuleStep::Deduplicate {
                key: "cst_id".into(),
                recency: "cst_create_date".into(),
            },
            RuleStep::Cleanse {
                fixes: vec![trim("cst_firstname"), trim("cst_lastname")],
            },
            normalize(
                "cst_marital_status",
                LookupTable::new(&[(&["S"], "Single"), (&["M"], "Married")]),
            ),
            normalize("cst_gndr", gender_table(false)),
        ],
        EntityKind::Product => vec![
            RuleStep::Cleanse {
                fixes: vec![FieldFix::SplitKey {
                    field: "prd_key".into(),
                    category_field: "cat_id".into(),
                    category_len: 5,
                    separator: '-',
                    replacement: '_',
                }],
            },
            RuleStep::Cleanse {
                fixes: vec![FieldFix::DefaultIfNull {
                    field: "prd_cost".into(),
                    value: Value::Int(0),
                }],
            },
            normalize(
                "prd_line",
                LookupTable::new(&[
                    (&["M"], "Mountain"),
                    (&["R"], "Road"),
                    (&["S"], "Other Sales"),
                    (&["T"], "Touring"),
                ]),
            ),
            RuleStep::Derive {
                derivation: Derivation::Lead {
                    target: "prd_end_dt".into(),
                    partition_by: vec!["prd_key".into()],
                    order_by: "prd_start_dt".into(),
                    offset_days: -1,
                    open_ended: open_ended_date(),
                },
            },
        ],
        EntityKind::Sales => {
            let line_total = Formula::Multiply {
                left: Operand::field("sls_quantity"),
                right: Operand::abs("sls_price"),
            };
            vec![
                RuleStep::Cleanse {
                    fixes: vec![
                        parse_compact_date("sls_order_dt"),
                        parse_compact_date("sls_ship_dt"),
                        parse_compact_date("sls_due_dt"),
                    ],
                },
                RuleStep::Substitute {
                    field: "sls_sales".into(),
                    when: vec![
                        Condition::Missing,
                        Condition::NonPositive,
                        Condition::DiffersFrom {
                            formula: line_total.clone(),
                        },
                    ],
                    recompute: Some(line_total),
                },
                // Runs after sales, so it divides the already-corrected total.
                RuleStep::Substitute {
                    field: "sls_price".into(),
                    when: vec![Condition::Missing, Condition::NonPositive],
                    recompute: Some(Formula::Divide {
                        numerator: Operand::field("sls_sales"),
                        denominator: Operand::field("sls_quantity"),
                    }),
                },
            ]
        }
        EntityKind::Location => vec![
            RuleStep::Cleanse {
                fixes: vec![FieldFix::StripPattern {
                    field: "cid".into(),
                    pattern: "[[:punct:]]".into(),
                }],
            },
            normalize("cntry", country_table()),
        ],
        EntityKind::CustomerDemographic => vec![
            RuleStep::Cleanse {
                fixes: vec![FieldFix::StripPattern {
                    field: "cid".into(),
                    pattern: "^NAS".into(),
                }],
            },
            RuleStep::Substitute {
                field: "bdate".into(),
                when: vec![Condition::InFuture],
                recompute: None,
            },
            normalize("gen", gender_table(true)),
        ],
        EntityKind::ProductCategory => Vec::new(),
    }
}
