use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::Result;
use crate::features::{FeatureSchema, FeatureVector};
use crate::xgb_runtime::XgbRuntime;

/// Anything that turns an assembled row into a default probability.
///
/// The pipeline only talks to this trait, so tests swap in fixed scorers
/// without an artifact on disk.
pub trait Scorer: Send + Sync {
    /// Column contract rows must be assembled against.
    fn schema(&self) -> &Arc<FeatureSchema>;

    /// Probability of default in [0, 1].
    fn score(&self, features: &FeatureVector) -> Result<f64>;

    /// Global importance per schema column, same order as [`Scorer::schema`].
    fn importance(&self) -> &[f64];
}

pub type ModelHandle = Arc<XgbRuntime>;

static MODEL: OnceLock<ModelHandle> = OnceLock::new();
static LOAD_LOCK: Mutex<()> = Mutex::new(());

/// Process-wide model, loaded on first success and shared read-only after.
///
/// Failures are not cached: once the artifact is restored the next call
/// loads it. The first successful path wins for the life of the process.
pub fn load(path: impl AsRef<Path>) -> Result<ModelHandle> {
    let path = path.as_ref();
    if let Some(h) = MODEL.get() {
        warn_if_other_path(h, path);
        return Ok(Arc::clone(h));
    }

    // Poisoning only means another loader panicked; the OnceLock is still sound.
    let _guard = LOAD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(h) = MODEL.get() {
        return Ok(Arc::clone(h));
    }

    let handle = Arc::new(XgbRuntime::load_from_path(path).inspect_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "model load failed");
        metrics::counter!("model_load_failed_total").increment(1);
    })?);
    let _ = MODEL.set(Arc::clone(&handle));
    Ok(handle)
}

/// The loaded model, if any call to [`load`] has succeeded.
pub fn loaded() -> Option<ModelHandle> {
    MODEL.get().cloned()
}

pub fn score(handle: &dyn Scorer, features: &FeatureVector) -> Result<f64> {
    handle.score(features)
}

fn warn_if_other_path(h: &XgbRuntime, requested: &Path) {
    if h.model_path != requested {
        tracing::warn!(
            loaded = %h.model_path.display(),
            requested = %requested.display(),
            "model already loaded from another path; keeping it"
        );
    }
}
