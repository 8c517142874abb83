use crate::model::Scorer;
use crate::schema::{FeatureImportance, ImportanceEntry};

pub const DEFAULT_TOP_N: usize = 10;

/// Top-`n` columns by the model's global importance weight.
///
/// Descending by weight; equal weights keep schema order, so the same
/// artifact always yields the same list.
pub fn top_features(handle: &dyn Scorer, n: usize) -> FeatureImportance {
    let names = handle.schema().names();
    let weights = handle.importance();

    let mut ranked: Vec<(usize, f64)> = weights.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let entries = ranked
        .into_iter()
        .take(n)
        .filter_map(|(i, weight)| {
            names.get(i).map(|name| ImportanceEntry {
                feature: name.clone(),
                weight,
            })
        })
        .collect();
    FeatureImportance { entries }
}
