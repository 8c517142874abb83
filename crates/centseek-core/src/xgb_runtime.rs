//! Native evaluator for XGBoost JSON tree ensembles.
//!
//! Reads the artifact written by `Booster.save_model("centseek_model.json")`
//! and scores dense rows without linking libxgboost. Traversal follows
//! XGBoost exactly: a missing value (`NaN`) takes `default_left`, otherwise
//! `value < split_condition` goes left. Leaves are summed in tree order in
//! `f32` on top of `logit(base_score)`, then passed through the sigmoid.

use anyhow::{anyhow, bail, ensure, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::error::{CentseekError, Result};
use crate::features::{FeatureSchema, FeatureVector};
use crate::model::Scorer;
use crate::util::{logit, sigmoid};

/// Batches smaller than this are scored on the calling thread.
const PARALLEL_MIN_ROWS: usize = 256;

const SUPPORTED_OBJECTIVES: &[&str] = &["binary:logistic", "reg:logistic"];

#[derive(Debug, Deserialize)]
struct ArtifactJson {
    learner: LearnerJson,
    #[serde(default)]
    version: Vec<u32>,
    /// Optional `{feature: weight}` written next to the booster at export.
    #[serde(default)]
    feature_importance: Option<HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct LearnerJson {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: BoosterJson,
    learner_model_param: LearnerParamJson,
    objective: ObjectiveJson,
}

#[derive(Debug, Deserialize)]
struct BoosterJson {
    name: String,
    #[serde(default)]
    model: Option<GbTreeJson>,
}

#[derive(Debug, Deserialize)]
struct GbTreeJson {
    trees: Vec<TreeJson>,
}

#[derive(Debug, Deserialize)]
struct TreeJson {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    loss_changes: Vec<f32>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// `default_left` is `[0, 1, ..]` in most releases and `[false, true, ..]` in some.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LearnerParamJson {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectiveJson {
    name: String,
}

#[derive(Debug, Clone)]
struct Tree {
    left: Vec<i32>,
    right: Vec<i32>,
    feature: Vec<u32>,
    /// Split threshold for internal nodes, leaf value for leaves.
    cond: Vec<f32>,
    default_left: Vec<bool>,
}

impl Tree {
    fn from_json(
        id: usize,
        t: TreeJson,
        n_features: usize,
        gains: &mut [(f64, u32)],
    ) -> anyhow::Result<Self> {
        let n = t.left_children.len();
        ensure!(n > 0, "tree {id}: no nodes");
        ensure!(
            t.right_children.len() == n
                && t.split_indices.len() == n
                && t.split_conditions.len() == n
                && t.default_left.len() == n,
            "tree {id}: node arrays disagree in length"
        );
        if t.split_type.iter().any(|s| *s != 0) {
            bail!("tree {id}: categorical splits are not supported");
        }

        let mut feature = Vec::with_capacity(n);
        for nid in 0..n {
            let (l, r) = (t.left_children[nid], t.right_children[nid]);
            if l == -1 {
                ensure!(r == -1, "tree {id} node {nid}: leaf with a right child");
                feature.push(0);
                continue;
            }
            // Children are always appended after their parent, so requiring
            // child > parent also rules out cycles.
            for c in [l, r] {
                ensure!(
                    c > nid as i32 && (c as usize) < n,
                    "tree {id} node {nid}: child {c} out of range"
                );
            }
            let f = t.split_indices[nid];
            ensure!(
                f >= 0 && (f as usize) < n_features,
                "tree {id} node {nid}: split feature {f} outside schema of {n_features}"
            );
            ensure!(
                t.split_conditions[nid].is_finite(),
                "tree {id} node {nid}: non-finite split condition"
            );
            if let Some(g) = t.loss_changes.get(nid) {
                let slot = &mut gains[f as usize];
                slot.0 += f64::from(*g);
                slot.1 += 1;
            }
            feature.push(f as u32);
        }

        Ok(Self {
            left: t.left_children,
            right: t.right_children,
            feature,
            cond: t.split_conditions,
            default_left: t.default_left.iter().map(Flag::is_set).collect(),
        })
    }

    #[inline]
    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut nid = 0usize;
        loop {
            let left = self.left[nid];
            if left < 0 {
                return self.cond[nid];
            }
            let v = row[self.feature[nid] as usize];
            let go_left = if v.is_nan() {
                self.default_left[nid]
            } else {
                v < self.cond[nid]
            };
            nid = if go_left { left } else { self.right[nid] } as usize;
        }
    }
}

#[derive(Debug)]
pub struct XgbRuntime {
    pub model_path: PathBuf,
    /// `[major, minor, patch]` of the XGBoost that wrote the artifact.
    pub version: Vec<u32>,
    schema: Arc<FeatureSchema>,
    trees: Vec<Tree>,
    base_margin: f32,
    importance: Vec<f64>,
}

fn read_artifact(path: &Path) -> anyhow::Result<ArtifactJson> {
    let f = fs::File::open(path).with_context(|| format!("open model: {}", path.display()))?;
    let gz = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    let reader: Box<dyn Read> = if gz {
        Box::new(flate2::read::GzDecoder::new(f))
    } else {
        Box::new(f)
    };
    serde_json::from_reader(BufReader::new(reader))
        .with_context(|| format!("parse model: {}", path.display()))
}

fn parse_base_score(s: &str) -> anyhow::Result<f32> {
    // 2.x writes "5E-1", 3.x writes "[5E-1]".
    let t = s.trim().trim_start_matches('[').trim_end_matches(']').trim();
    let p: f32 = t
        .parse()
        .with_context(|| format!("parse base_score `{s}`"))?;
    ensure!(p > 0.0 && p < 1.0, "base_score {p} outside (0, 1)");
    Ok(p)
}

fn schema_from_names(names: Vec<String>) -> anyhow::Result<FeatureSchema> {
    FeatureSchema::new(names).map_err(|e| match e {
        CentseekError::ModelLoad(m) => anyhow!(m),
        other => anyhow!(other.to_string()),
    })
}

fn normalize(weights: &mut [f64]) {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            *w /= total;
        }
    }
}

impl XgbRuntime {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::load_inner(path).map_err(|e| CentseekError::model_load(format!("{e:#}")))
    }

    fn load_inner(path: &Path) -> anyhow::Result<Self> {
        let art = read_artifact(path)?;
        let learner = art.learner;

        ensure!(
            SUPPORTED_OBJECTIVES.contains(&learner.objective.name.as_str()),
            "objective `{}` does not produce a probability",
            learner.objective.name
        );
        if let Some(nc) = learner.learner_model_param.num_class.as_deref() {
            let nc: u32 = nc.parse().with_context(|| format!("parse num_class `{nc}`"))?;
            ensure!(nc <= 1, "multi-class model (num_class={nc}) is not a default classifier");
        }
        ensure!(
            learner.gradient_booster.name == "gbtree",
            "booster `{}` is not supported, expected gbtree",
            learner.gradient_booster.name
        );

        if learner.feature_names.is_empty() {
            bail!("artifact carries no feature_names; column order is unknown");
        }
        if let Some(nf) = learner.learner_model_param.num_feature.as_deref() {
            let nf: usize = nf.parse().with_context(|| format!("parse num_feature `{nf}`"))?;
            ensure!(
                nf == learner.feature_names.len(),
                "num_feature={nf} but {} feature_names",
                learner.feature_names.len()
            );
        }
        let schema = schema_from_names(learner.feature_names)?;
        let n_features = schema.len();

        let base_margin = logit(parse_base_score(&learner.learner_model_param.base_score)?);

        let gbtree = learner
            .gradient_booster
            .model
            .ok_or_else(|| anyhow!("gradient_booster.model missing"))?;
        ensure!(!gbtree.trees.is_empty(), "model has no trees");

        let mut gains = vec![(0.0f64, 0u32); n_features];
        let trees = gbtree
            .trees
            .into_iter()
            .enumerate()
            .map(|(id, t)| Tree::from_json(id, t, n_features, &mut gains))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let importance = match art.feature_importance {
            Some(map) => {
                let mut w = vec![0.0; n_features];
                for (name, v) in map {
                    let i = schema
                        .names()
                        .iter()
                        .position(|n| *n == name)
                        .ok_or_else(|| anyhow!("feature_importance names unknown feature `{name}`"))?;
                    ensure!(v.is_finite(), "feature_importance[{name}] is not finite");
                    w[i] = v;
                }
                w
            }
            None => {
                // XGBoost "gain": mean loss reduction of the splits on each feature.
                let mut w: Vec<f64> = gains
                    .iter()
                    .map(|(sum, cnt)| if *cnt > 0 { sum / f64::from(*cnt) } else { 0.0 })
                    .collect();
                normalize(&mut w);
                w
            }
        };

        tracing::info!(
            path = %path.display(),
            trees = trees.len(),
            features = n_features,
            "loaded default-risk model"
        );

        Ok(Self {
            model_path: path.to_path_buf(),
            version: art.version,
            schema: Arc::new(schema),
            trees,
            base_margin,
            importance,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    fn margin(&self, row: &[f32]) -> f32 {
        let mut m = self.base_margin;
        for t in &self.trees {
            m += t.leaf_value(row);
        }
        m
    }

    #[inline]
    fn proba(&self, row: &[f32]) -> Result<f64> {
        let p = f64::from(sigmoid(self.margin(row)));
        if !p.is_finite() {
            return Err(CentseekError::inference(format!("non-finite probability {p}")));
        }
        Ok(p)
    }

    fn check(&self, fv: &FeatureVector) -> Result<()> {
        if !fv.matches(&self.schema) {
            return Err(CentseekError::inference(format!(
                "feature vector shape mismatch: got len={} expect={} for {}",
                fv.values().len(),
                self.schema.len(),
                self.model_path.display()
            )));
        }
        Ok(())
    }

    /// Score many rows; large batches fan out over scoped threads.
    ///
    /// Every row goes through the same traversal as [`Scorer::score`], so the
    /// outputs are bit-identical to scoring one at a time.
    pub fn predict_proba_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        for fv in rows {
            self.check(fv)?;
        }
        if rows.len() < PARALLEL_MIN_ROWS {
            return rows.iter().map(|fv| self.proba(fv.values())).collect();
        }

        let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let chunk = rows.len().div_ceil(workers);
        let parts: Vec<Result<Vec<f64>>> = thread::scope(|s| {
            let handles: Vec<_> = rows
                .chunks(chunk)
                .map(|part| {
                    s.spawn(move || {
                        part.iter()
                            .map(|fv| self.proba(fv.values()))
                            .collect::<Result<Vec<f64>>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(CentseekError::inference("batch worker panicked")))
                })
                .collect()
        });

        let mut out = Vec::with_capacity(rows.len());
        for part in parts {
            out.extend(part?);
        }
        Ok(out)
    }
}

impl Scorer for XgbRuntime {
    fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    fn score(&self, features: &FeatureVector) -> Result<f64> {
        self.check(features)?;
        self.proba(features.values())
    }

    fn importance(&self) -> &[f64] {
        &self.importance
    }
}
