// silver-core/src/domain/transform/mod.rs

//! Transformation evaluator.
//!
//! A rule set is compiled once into a [`TransformPlan`] (field references checked,
//! patterns and lookup tables built), then run over a lazy sequence of raw rows.
//! Row-local steps stream; windowed steps buffer their upstream on first pull.

mod steps;
mod window;

use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::domain::entity::EntityKind;
use crate::domain::error::DomainError;
use crate::domain::rules::{Derivation, RuleStep};
use crate::domain::schema::{self, RawRow};
use crate::domain::value::Record;

use steps::{CompiledFix, RowOp, RowStep};
use window::{WindowOp, WindowStep};

/// Evaluation inputs that are not part of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformContext {
    /// Reference date for "in the future" conditions.
    pub as_of: NaiveDate,
}

impl TransformContext {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }

    /// A reference date after today would let future dates through that the
    /// quality suite (evaluated against the current date) then rejects.
    pub fn capped(as_of: NaiveDate) -> Self {
        let today = Self::today();
        if as_of > today.as_of { today } else { Self::new(as_of) }
    }
}

impl Default for TransformContext {
    fn default() -> Self {
        Self::today()
    }
}

pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<Record, DomainError>> + 'a>;

enum CompiledStep {
    Row(RowStep),
    Window(WindowStep),
}

pub struct TransformPlan {
    entity: EntityKind,
    steps: Vec<CompiledStep>,
}

impl TransformPlan {
    pub fn compile(
        entity: EntityKind,
        rules: &[RuleStep],
        ctx: &TransformContext,
    ) -> Result<Self, DomainError> {
        let mut available: BTreeSet<String> = schema::raw(entity)
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut steps = Vec::with_capacity(rules.len());
        for step in rules {
            let label = step.label();
            if let Some(missing) = step.inputs().into_iter().find(|f| !available.contains(*f)) {
                return Err(DomainError::rule(
                    entity,
                    &label,
                    format!("unknown field '{}'", missing),
                ));
            }
            available.extend(step.outputs().into_iter().map(String::from));
            steps.push(compile_step(entity, label, step, ctx)?);
        }

        if let Some(column) = schema::cleansed(entity)
            .column_names()
            .into_iter()
            .find(|c| !available.contains(*c))
        {
            return Err(DomainError::rule(
                entity,
                "projection",
                format!("column '{}' is never produced", column),
            ));
        }

        Ok(Self { entity, steps })
    }

    /// Runs the plan. The stream ends right after the first error it yields.
    pub fn stream<'a, I>(self, raw: I) -> RecordStream<'a>
    where
        I: IntoIterator<Item = RawRow>,
        I::IntoIter: 'a,
    {
        let entity = self.entity;
        let raw_schema = schema::raw(entity);
        let mut stream: RecordStream<'a> =
            Box::new(raw.into_iter().map(move |row| raw_schema.parse_row(entity, row)));

        for step in self.steps {
            stream = match step {
                CompiledStep::Row(op) => Box::new(stream.map(move |r| r.and_then(|rec| op.apply(rec)))),
                CompiledStep::Window(op) => Box::new(Barrier::new(stream, op)),
            };
        }

        let cleansed = schema::cleansed(entity);
        Box::new(
            stream
                .map(move |r| r.and_then(|rec| cleansed.project(entity, rec)))
                .scan(false, |failed, item| {
                    if *failed {
                        return None;
                    }
                    *failed = item.is_err();
                    Some(item)
                }),
        )
    }
}

fn compile_step(
    entity: EntityKind,
    label: String,
    step: &RuleStep,
    ctx: &TransformContext,
) -> Result<CompiledStep, DomainError> {
    let fail = |reason: String| DomainError::rule(entity, &label, reason);
    let row = |op: RowOp| -> Result<CompiledStep, DomainError> {
        Ok(CompiledStep::Row(RowStep {
            entity,
            label: label.clone(),
            op,
        }))
    };
    let window = |op: WindowOp| -> Result<CompiledStep, DomainError> {
        Ok(CompiledStep::Window(WindowStep {
            entity,
            label: label.clone(),
            op,
        }))
    };

    match step {
        RuleStep::Deduplicate { key, recency } => window(WindowOp::Deduplicate {
            key: key.clone(),
            recency: recency.clone(),
        }),
        RuleStep::Cleanse { fixes } => {
            let compiled = fixes
                .iter()
                .map(CompiledFix::compile)
                .collect::<Result<Vec<_>, _>>()
                .map_err(fail)?;
            row(RowOp::Cleanse(compiled))
        }
        RuleStep::Normalize { field, table } => row(RowOp::normalize(field, table).map_err(fail)?),
        RuleStep::Derive { derivation } => match derivation {
            Derivation::Compute { target, formula } => row(RowOp::Compute {
                target: target.clone(),
                formula: formula.clone(),
            }),
            Derivation::Lead {
                target,
                partition_by,
                order_by,
                offset_days,
                open_ended,
            } => window(WindowOp::Lead {
                target: target.clone(),
                partition_by: partition_by.clone(),
                order_by: order_by.clone(),
                offset_days: *offset_days,
                open_ended: *open_ended,
            }),
        },
        RuleStep::Substitute {
            field,
            when,
            recompute,
        } => row(RowOp::Substitute {
            field: field.clone(),
            when: when.clone(),
            recompute: recompute.clone(),
            as_of: ctx.as_of,
        }),
    }
}

/// Collects the whole upstream on first pull, then replays the windowed result.
struct Barrier<'a> {
    upstream: Option<RecordStream<'a>>,
    step: WindowStep,
    buffered: std::vec::IntoIter<Record>,
}

impl<'a> Barrier<'a> {
    fn new(upstream: RecordStream<'a>, step: WindowStep) -> Self {
        Self {
            upstream: Some(upstream),
            step,
            buffered: Vec::new().into_iter(),
        }
    }
}

impl Iterator for Barrier<'_> {
    type Item = Result<Record, DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(upstream) = self.upstream.take() {
            let windowed = upstream
                .collect::<Result<Vec<_>, _>>()
                .and_then(|rows| self.step.apply(rows));
            match windowed {
                Ok(rows) => self.buffered = rows.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
        self.buffered.next().map(Ok)
    }
}

/// Compiles `rules` for `entity` and returns the lazy cleansed sequence.
///
/// Rule-set problems surface here, before any row is read. Row-level problems
/// surface as the last item of the stream.
pub fn transform<'a, I>(
    entity: EntityKind,
    rules: &[RuleStep],
    raw: I,
    ctx: &TransformContext,
) -> Result<RecordStream<'a>, DomainError>
where
    I: IntoIterator<Item = RawRow>,
    I::IntoIter: 'a,
{
    Ok(TransformPlan::compile(entity, rules, ctx)?.stream(raw))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::rules::{FieldFix, Formula, LookupTable, Operand, RuleCatalog};
    use crate::domain::value::Value;

    fn ctx() -> TransformContext {
        TransformContext::new(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn row(cells: &[Option<&str>]) -> RawRow {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    fn run(entity: EntityKind, rows: Vec<RawRow>) -> Result<Vec<Record>, DomainError> {
        let catalog = RuleCatalog::builtin();
        transform(entity, catalog.rules_for(entity), rows, &ctx())?.collect()
    }

    #[test]
    fn test_customer_scenario() {
        let rows = vec![
            row(&[Some("7"), Some("AW07"), Some(" Ann "), Some("Lee"), Some("s"), Some("F"), Some("2024-01-01")]),
            row(&[Some("7"), Some("AW07"), Some("Anne"), Some("Lee"), Some("M"), Some("F"), Some("2024-06-01")]),
        ];
        let out = run(EntityKind::Customer, rows).unwrap();
        assert_eq!(out.len(), 1);
        let rec = &out[0];
        assert_eq!(rec.get("cst_id"), &Value::Int(7));
        assert_eq!(rec.get("cst_firstname"), &Value::text("Anne"));
        assert_eq!(rec.get("cst_marital_status"), &Value::text("Married"));
        assert_eq!(rec.get("cst_gndr"), &Value::text("Female"));
        assert_eq!(rec.get("cst_create_date"), &date(2024, 6, 1));
    }

    #[test]
    fn test_customer_null_key_and_unknown_codes() {
        let rows = vec![
            row(&[None, Some("AW00"), Some("X"), Some("Y"), Some("M"), Some("M"), Some("2024-01-01")]),
            row(&[Some("8"), Some("AW08"), Some(" Bo"), Some("Ng  "), Some("D"), None, None]),
        ];
        let out = run(EntityKind::Customer, rows).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("cst_firstname"), &Value::text("Bo"));
        assert_eq!(out[0].get("cst_lastname"), &Value::text("Ng"));
        assert_eq!(out[0].get("cst_marital_status"), &Value::text("n/a"));
        assert_eq!(out[0].get("cst_gndr"), &Value::text("n/a"));
    }

    #[test]
    fn test_product_versions() {
        let rows = vec![
            row(&[Some("212"), Some("AC-HE-HL-U509-R"), Some("Helmet"), Some("12"), Some("S"), Some("2011-07-01"), None]),
            row(&[Some("213"), Some("AC-HE-HL-U509-R"), Some("Helmet"), Some("14"), Some("S "), Some("2012-07-01"), Some("2007-12-28")]),
            row(&[Some("214"), Some("AC-HE-HL-U509-R"), Some("Helmet"), None, Some("x"), Some("2013-07-01"), None]),
        ];
        let out = run(EntityKind::Product, rows).unwrap();
        assert_eq!(out.len(), 3);
        let ends: Vec<_> = out.iter().map(|r| r.get("prd_end_dt").clone()).collect();
        assert_eq!(ends, vec![date(2012, 6, 30), date(2013, 6, 30), date(9999, 12, 31)]);
        assert_eq!(out[0].get("cat_id"), &Value::text("AC_HE"));
        assert_eq!(out[0].get("prd_key"), &Value::text("HL-U509-R"));
        assert_eq!(out[0].get("prd_line"), &Value::text("Other Sales"));
        assert_eq!(out[2].get("prd_cost"), &Value::Int(0));
        assert_eq!(out[2].get("prd_line"), &Value::text("n/a"));
    }

    fn sales_row(sales: Option<&str>, qty: &str, price: Option<&str>) -> RawRow {
        row(&[
            Some("SO1"),
            Some("K1"),
            Some("11000"),
            Some("20101229"),
            Some("0"),
            Some("2011011"),
            sales,
            Some(qty),
            price,
        ])
    }

    fn sales_figures(rec: &Record) -> (Value, Value, Value) {
        (
            rec.get("sls_sales").clone(),
            rec.get("sls_quantity").clone(),
            rec.get("sls_price").clone(),
        )
    }

    #[test]
    fn test_sales_dates_and_recompute() {
        let out = run(
            EntityKind::Sales,
            vec![sales_row(Some("50"), "2", Some("-20"))],
        )
        .unwrap();
        let rec = &out[0];
        assert_eq!(rec.get("sls_order_dt"), &date(2010, 12, 29));
        assert!(rec.get("sls_ship_dt").is_null());
        assert!(rec.get("sls_due_dt").is_null());
        assert_eq!(
            sales_figures(rec),
            (Value::Float(40.0), Value::Int(2), Value::Float(20.0))
        );
    }

    #[test]
    fn test_sales_missing_price_is_derived_from_sales() {
        let out = run(EntityKind::Sales, vec![sales_row(Some("30"), "3", None)]).unwrap();
        assert_eq!(
            sales_figures(&out[0]),
            (Value::Float(30.0), Value::Int(3), Value::Float(10.0))
        );
    }

    #[test]
    fn test_sales_both_invalid_corner_case() {
        // Sales is corrected first, then price is derived from the corrected sales.
        let out = run(EntityKind::Sales, vec![sales_row(Some("0"), "3", Some("0"))]).unwrap();
        assert_eq!(
            sales_figures(&out[0]),
            (Value::Float(0.0), Value::Int(3), Value::Float(0.0))
        );
    }

    #[test]
    fn test_sales_zero_quantity_guards_division() {
        let out = run(EntityKind::Sales, vec![sales_row(None, "0", None)]).unwrap();
        let (sales, _, price) = sales_figures(&out[0]);
        assert!(sales.is_null());
        assert!(price.is_null());
    }

    #[test]
    fn test_location_and_demographic_normalization() {
        let locations = run(
            EntityKind::Location,
            vec![
                row(&[Some("AW-00011000"), Some("DE")]),
                row(&[Some("AW-00011001"), Some(" usa")]),
                row(&[Some("AW-00011002"), Some("Australia")]),
                row(&[Some("AW-00011003"), Some("")]),
                row(&[Some("AW-00011004"), Some("Atlantis")]),
            ],
        )
        .unwrap();
        let countries: Vec<_> = locations.iter().map(|r| r.get("cntry").to_string()).collect();
        assert_eq!(countries, vec!["Germany", "United States", "Australia", "n/a", "n/a"]);
        assert_eq!(locations[0].get("cid"), &Value::text("AW00011000"));

        let demographics = run(
            EntityKind::CustomerDemographic,
            vec![
                row(&[Some("NASAW00011000"), Some("1971-10-06"), Some("Male")]),
                row(&[Some("AW00011001"), Some("2099-01-01"), Some(" f ")]),
            ],
        )
        .unwrap();
        assert_eq!(demographics[0].get("cid"), &Value::text("AW00011000"));
        assert_eq!(demographics[0].get("gen"), &Value::text("Male"));
        assert!(demographics[1].get("bdate").is_null());
        assert_eq!(demographics[1].get("gen"), &Value::text("Female"));
    }

    #[test]
    fn test_category_is_identity() {
        let raw = row(&[Some("AC_BR"), Some("Accessories"), Some("Bike Racks"), Some("Yes")]);
        let out = run(EntityKind::ProductCategory, vec![raw]).unwrap();
        assert_eq!(out[0].get("subcat"), &Value::text("Bike Racks"));
        assert_eq!(out[0].len(), 4);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let rows = || {
            vec![
                row(&[Some("3"), Some("A"), Some("x"), Some("y"), Some("S"), Some("F"), Some("2024-01-01")]),
                row(&[Some("3"), Some("B"), Some("x"), Some("y"), Some("M"), Some("F"), Some("2024-01-01")]),
                row(&[Some("1"), Some("C"), Some("x"), Some("y"), Some("S"), Some("M"), Some("2023-01-01")]),
            ]
        };
        let first = run(EntityKind::Customer, rows()).unwrap();
        let mut reversed = rows();
        reversed.reverse();
        let second = run(EntityKind::Customer, reversed).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_malformed_row_fails_the_whole_entity() {
        let rows = vec![
            row(&[Some("AW1"), Some("DE")]),
            row(&[Some("AW2")]),
            row(&[Some("AW3"), Some("FR")]),
        ];
        let err = run(EntityKind::Location, rows).unwrap_err();
        assert_eq!(err.code(), "entity_parse_error");
        assert!(err.to_string().contains("AW2"));
    }

    #[test]
    fn test_stream_stops_after_first_error() {
        let rows = vec![
            row(&[Some("x"), Some("K"), Some("1"), Some("0"), Some("0"), Some("0"), None, Some("1"), None]),
            row(&[Some("y"), Some("K"), Some("oops"), Some("0"), Some("0"), Some("0"), None, Some("1"), None]),
            row(&[Some("z"), Some("K"), Some("1"), Some("0"), Some("0"), Some("0"), None, Some("1"), None]),
        ];
        let catalog = RuleCatalog::builtin();
        let items: Vec<_> = transform(EntityKind::Sales, catalog.rules_for(EntityKind::Sales), rows, &ctx())
            .unwrap()
            .collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn test_unknown_field_is_rejected_at_compile_time() {
        let rules = vec![RuleStep::Cleanse {
            fixes: vec![FieldFix::Trim {
                field: "nickname".into(),
            }],
        }];
        let err = TransformPlan::compile(EntityKind::Customer, &rules, &ctx())
            .err()
            .unwrap();
        assert_eq!(err.code(), "rule_evaluation_error");
        assert!(err.to_string().contains("nickname"));
    }

    #[test]
    fn test_ambiguous_lookup_and_missing_projection_column() {
        let ambiguous = vec![RuleStep::Normalize {
            field: "cntry".into(),
            table: LookupTable::new(&[(&["D"], "Germany"), (&["d"], "Denmark")]),
        }];
        assert!(TransformPlan::compile(EntityKind::Location, &ambiguous, &ctx()).is_err());

        // Without the key split, the cleansed product layout lacks its category column.
        let err = TransformPlan::compile(EntityKind::Product, &[], &ctx())
            .err()
            .unwrap();
        assert!(err.to_string().contains("cat_id"));
    }

    #[test]
    fn test_reference_date_is_capped_at_today() {
        let past = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(TransformContext::capped(past).as_of, past);

        let far = NaiveDate::from_ymd_opt(9999, 1, 1).unwrap();
        assert!(TransformContext::capped(far).as_of <= TransformContext::today().as_of);
    }

    fn compact_dates() -> RuleStep {
        RuleStep::Cleanse {
            fixes: ["sls_order_dt", "sls_ship_dt", "sls_due_dt"]
                .into_iter()
                .map(|field| FieldFix::ParseCompactDate {
                    field: field.into(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_compute_override_on_sales() {
        let rules = vec![
            compact_dates(),
            RuleStep::Derive {
                derivation: Derivation::Compute {
                    target: "sls_sales".into(),
                    formula: Formula::Multiply {
                        left: Operand::field("sls_quantity"),
                        right: Operand::abs("sls_price"),
                    },
                },
            },
        ];
        let rows = vec![
            sales_row(Some("1"), "3", Some("-2.5")),
            sales_row(Some("1"), "3", None),
        ];
        let out: Vec<Record> = transform(EntityKind::Sales, &rules, rows, &ctx())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            sales_figures(&out[0]),
            (Value::Float(7.5), Value::Int(3), Value::Float(-2.5))
        );
        assert!(out[1].get("sls_sales").is_null());
        assert_eq!(out[0].get("sls_order_dt"), &date(2010, 12, 29));
    }

    #[test]
    fn test_compute_into_int_column_fails_projection() {
        let rules = vec![
            RuleStep::Cleanse {
                fixes: vec![FieldFix::SplitKey {
                    field: "prd_key".into(),
                    category_field: "cat_id".into(),
                    category_len: 5,
                    separator: '-',
                    replacement: '_',
                }],
            },
            RuleStep::Derive {
                derivation: Derivation::Compute {
                    target: "prd_cost".into(),
                    formula: Formula::Divide {
                        numerator: Operand::field("prd_cost"),
                        denominator: Operand::field("prd_id"),
                    },
                },
            },
        ];
        let rows = vec![row(&[
            Some("2"),
            Some("AC-HE-HL-U509"),
            Some("Helmet"),
            Some("15"),
            Some("S"),
            Some("2011-07-01"),
            None,
        ])];
        let err = transform(EntityKind::Product, &rules, rows, &ctx())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_eq!(err.code(), "rule_evaluation_error");
        match &err {
            DomainError::RuleEvaluation { step, reason, .. } => {
                assert_eq!(step, "projection");
                assert!(reason.contains("prd_cost"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
