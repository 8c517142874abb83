// crates/centseek-core/src/schema.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorReport;

pub const N_DELAYS: usize = 7;
pub const N_MONTHS: usize = 6;

/// One customer's statement history as entered on the form.
///
/// Every sequence is most-recent-first: `delays[0]` is `PAY_0`,
/// `bill_amounts[0]` is `BILL_AMT1`, `payment_amounts[0]` is `PAY_AMT1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCustomerInput {
    pub credit_limit: f64,
    /// Months of repayment delay, 0 = paid on time, 9 = nine months or more.
    pub delays: [i32; N_DELAYS],
    pub bill_amounts: [f64; N_MONTHS],
    pub payment_amounts: [f64; N_MONTHS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Unlikely,
    Moderate,
    Likely,
    VeryLikely,
}

impl RiskCategory {
    pub fn label(&self) -> &'static str {
        match self {
            RiskCategory::VeryLikely => "very likely to default",
            RiskCategory::Likely => "likely to default",
            RiskCategory::Moderate => "moderate default risk",
            RiskCategory::Unlikely => "unlikely to default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAssessment {
    probability: f64,
    category: RiskCategory,
}

impl RiskAssessment {
    /// Only the categorizer builds assessments, so the pair always agrees.
    pub(crate) fn new(probability: f64, category: RiskCategory) -> Self {
        Self {
            probability,
            category,
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn category(&self) -> RiskCategory {
        self.category
    }
}

/// avg_bill / avg_payment, or a sentinel when nothing was paid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BillPaymentRatio {
    Finite(f64),
    NoPayments,
}

impl BillPaymentRatio {
    /// `NoPayments` maps to positive infinity.
    pub fn as_f64(&self) -> f64 {
        match self {
            BillPaymentRatio::Finite(v) => *v,
            BillPaymentRatio::NoPayments => f64::INFINITY,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, BillPaymentRatio::Finite(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondaryIndicators {
    pub avg_bill: f64,
    pub avg_payment: f64,
    pub max_delay: i32,
    pub bill_to_payment_ratio: BillPaymentRatio,
    /// Months (out of 7) with a non-zero delay.
    pub delayed_months: u32,
    /// avg_bill / credit_limit.
    pub utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceEntry {
    pub feature: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct FeatureImportance {
    pub entries: Vec<ImportanceEntry>,
}

impl FeatureImportance {
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.feature.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentSource {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f64,
    pub source: SentimentSource,
    pub raw_text: String,
    /// Why the primary path was abandoned; never carries credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Risk half of an evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub assessment: RiskAssessment,
    pub importance: FeatureImportance,
    /// Stage timings (microseconds).
    pub timings_us: TimingsUs,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TimingsUs {
    pub validate: u64,
    pub feature: u64,
    pub score: u64,
    pub importance: u64,
}

/// Everything shown for one form submission. The risk and sentiment halves
/// fail independently.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub trace_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_error: Option<ErrorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicators: Option<SecondaryIndicators>,
    pub sentiment: SentimentResult,
}
