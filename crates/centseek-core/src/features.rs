//! Feature assembly: raw form values → dense model row.
//!
//! Column order is owned by the model artifact (`learner.feature_names`).
//! The assembler only knows how to *produce* each named column; it never
//! decides where a column goes. Names it can resolve:
//!
//! | column                    | source                        |
//! |---------------------------|-------------------------------|
//! | `ID`                      | constant 0 (row id in training) |
//! | `LIMIT_BAL`               | `credit_limit`                |
//! | `PAY_0` .. `PAY_6`        | `delays[0]` .. `delays[6]`    |
//! | `BILL_AMT1` .. `BILL_AMT6`| `bill_amounts[0]` .. `[5]`    |
//! | `PAY_AMT1` .. `PAY_AMT6`  | `payment_amounts[0]` .. `[5]` |

use std::sync::Arc;

use crate::error::{CentseekError, Result};
use crate::schema::{RawCustomerInput, N_DELAYS, N_MONTHS};

pub const MIN_DELAY: i32 = 0;
pub const MAX_DELAY: i32 = 9;

/// Exact decimal suffix: `0`, `1`, `12`, but not `01`, `+1` or ``.
fn column_index(s: &str) -> Option<usize> {
    let digits = !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    s.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Id,
    LimitBal,
    Delay(usize),
    Bill(usize),
    Payment(usize),
}

impl Column {
    fn parse(name: &str) -> Option<Self> {
        if name == "ID" {
            return Some(Column::Id);
        }
        if name == "LIMIT_BAL" {
            return Some(Column::LimitBal);
        }
        // PAY_AMT must be checked before PAY_.
        if let Some(rest) = name.strip_prefix("PAY_AMT") {
            let m = column_index(rest)?;
            return (1..=N_MONTHS).contains(&m).then_some(Column::Payment(m - 1));
        }
        if let Some(rest) = name.strip_prefix("BILL_AMT") {
            let m = column_index(rest)?;
            return (1..=N_MONTHS).contains(&m).then_some(Column::Bill(m - 1));
        }
        if let Some(rest) = name.strip_prefix("PAY_") {
            let m = column_index(rest)?;
            return (m < N_DELAYS).then_some(Column::Delay(m));
        }
        None
    }

    fn value(&self, raw: &RawCustomerInput) -> f32 {
        match *self {
            Column::Id => 0.0,
            Column::LimitBal => raw.credit_limit as f32,
            Column::Delay(i) => raw.delays[i] as f32,
            Column::Bill(i) => raw.bill_amounts[i] as f32,
            Column::Payment(i) => raw.payment_amounts[i] as f32,
        }
    }
}

/// Ordered column contract between the assembler and one model artifact.
#[derive(Debug, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl FeatureSchema {
    /// Fails when a column cannot be produced from [`RawCustomerInput`].
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(CentseekError::model_load(
                "feature schema is empty; refusing to guess column order",
            ));
        }
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let col = Column::parse(name).ok_or_else(|| {
                CentseekError::model_load(format!(
                    "feature {i} `{name}` cannot be produced from customer input"
                ))
            })?;
            if columns.contains(&col) {
                return Err(CentseekError::model_load(format!(
                    "feature `{name}` appears twice in schema"
                )));
            }
            columns.push(col);
        }
        Ok(Self { names, columns })
    }

    /// `LIMIT_BAL, PAY_0..PAY_6, BILL_AMT1..6, PAY_AMT1..6`.
    ///
    /// For callers without an artifact (indicator-only views, tests). A real
    /// model always brings its own schema.
    pub fn canonical() -> Self {
        let mut names = vec!["LIMIT_BAL".to_string()];
        names.extend((0..N_DELAYS).map(|i| format!("PAY_{i}")));
        names.extend((1..=N_MONTHS).map(|i| format!("BILL_AMT{i}")));
        names.extend((1..=N_MONTHS).map(|i| format!("PAY_AMT{i}")));
        let columns = names
            .iter()
            .filter_map(|n| Column::parse(n))
            .collect::<Vec<_>>();
        Self { names, columns }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Dense row plus the schema it was built for.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    schema: Arc<FeatureSchema>,
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        let i = self.schema.names.iter().position(|n| n == name)?;
        self.values.get(i).copied()
    }

    /// True when this row may be fed to a model whose schema is `schema`.
    pub fn matches(&self, schema: &Arc<FeatureSchema>) -> bool {
        self.values.len() == schema.len()
            && (Arc::ptr_eq(&self.schema, schema) || *self.schema == **schema)
    }
}

/// Field-level checks on the raw form values.
pub fn validate(raw: &RawCustomerInput) -> Result<()> {
    if !raw.credit_limit.is_finite() || raw.credit_limit <= 0.0 {
        return Err(CentseekError::validation(
            "credit_limit",
            format!("must be a positive number, got {}", raw.credit_limit),
        ));
    }
    for (i, d) in raw.delays.iter().enumerate() {
        if !(MIN_DELAY..=MAX_DELAY).contains(d) {
            return Err(CentseekError::validation(
                format!("delays[{i}]"),
                format!("must be in [{MIN_DELAY}, {MAX_DELAY}], got {d}"),
            ));
        }
    }
    check_amounts("bill_amounts", &raw.bill_amounts)?;
    check_amounts("payment_amounts", &raw.payment_amounts)?;
    Ok(())
}

fn check_amounts(field: &str, xs: &[f64]) -> Result<()> {
    for (i, x) in xs.iter().enumerate() {
        if !x.is_finite() || *x < 0.0 {
            return Err(CentseekError::validation(
                format!("{field}[{i}]"),
                format!("must be a non-negative number, got {x}"),
            ));
        }
    }
    Ok(())
}

/// Validate `raw` and lay it out in `schema` order.
pub fn assemble(schema: &Arc<FeatureSchema>, raw: &RawCustomerInput) -> Result<FeatureVector> {
    validate(raw)?;
    let values = schema.columns.iter().map(|c| c.value(raw)).collect();
    Ok(FeatureVector {
        schema: Arc::clone(schema),
        values,
    })
}
