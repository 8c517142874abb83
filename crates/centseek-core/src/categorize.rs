//! Probability → ordinal default-risk label.
//!
//! The bands are business rules agreed with the credit team. The `Likely`
//! band is only three points wide; keep it that way.

use crate::error::{CentseekError, Result};
use crate::schema::{RiskAssessment, RiskCategory};

/// Lower bound (inclusive) of `VeryLikely`.
pub const VERY_LIKELY_THRESHOLD: f64 = 0.48;
/// Lower bound (inclusive) of `Likely`.
pub const LIKELY_THRESHOLD: f64 = 0.45;
/// Lower bound (inclusive) of `Moderate`.
pub const MODERATE_THRESHOLD: f64 = 0.20;

pub fn categorize(probability: f64) -> Result<RiskCategory> {
    // NaN fails both comparisons and lands here too.
    if !(0.0..=1.0).contains(&probability) {
        tracing::error!(probability, "probability outside [0, 1] reached categorizer");
        return Err(CentseekError::Domain(probability));
    }

    let category = if probability >= VERY_LIKELY_THRESHOLD {
        RiskCategory::VeryLikely
    } else if probability >= LIKELY_THRESHOLD {
        RiskCategory::Likely
    } else if probability >= MODERATE_THRESHOLD {
        RiskCategory::Moderate
    } else {
        RiskCategory::Unlikely
    };
    Ok(category)
}

pub fn assess(probability: f64) -> Result<RiskAssessment> {
    let category = categorize(probability)?;
    Ok(RiskAssessment::new(probability, category))
}
