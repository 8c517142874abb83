use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use super::{label_from_str, Polarity, PolarityClassifier, SentimentError};
use crate::config::SentimentConfig;

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Text-classification model behind the Hugging Face inference API.
pub struct HfClassifier {
    http: Client,
    base_url: String,
    model: String,
    token: String,
}

impl fmt::Debug for HfClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HfClassifier")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl HfClassifier {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SentimentError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SentimentError::from_reqwest)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            token: token.into(),
        })
    }

    pub fn from_config(cfg: &SentimentConfig) -> Result<Self, SentimentError> {
        let token = std::env::var(&cfg.nlp_api_key_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SentimentError::MissingCredentials(cfg.nlp_api_key_var.clone()))?;
        Self::new(
            cfg.nlp_base_url.clone(),
            cfg.nlp_model.clone(),
            token,
            Duration::from_millis(cfg.timeout_ms),
        )
    }
}

/// The API answers `[[{label, score}, ..]]` for a single input; some
/// deployments drop the outer list.
fn best_label(v: Value) -> Result<Polarity, SentimentError> {
    let inner = match v {
        Value::Array(mut outer) if matches!(outer.first(), Some(Value::Array(_))) => {
            outer.swap_remove(0)
        }
        other => other,
    };
    let scores: Vec<LabelScore> =
        serde_json::from_value(inner).map_err(|e| SentimentError::Parse(e.to_string()))?;
    let best = scores
        .into_iter()
        .filter(|s| s.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| SentimentError::Parse("no labels returned".to_string()))?;
    Ok(Polarity {
        label: label_from_str(&best.label),
        score: best.score,
    })
}

#[async_trait]
impl PolarityClassifier for HfClassifier {
    async fn classify(&self, text: &str) -> Result<Polarity, SentimentError> {
        let resp = self
            .http
            .post(format!("{}/models/{}", self.base_url, self.model))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await
            .map_err(SentimentError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SentimentError::from_status(status.as_u16()));
        }
        let v: Value = resp
            .json()
            .await
            .map_err(|e| SentimentError::Parse(e.without_url().to_string()))?;
        best_label(v)
    }
}
