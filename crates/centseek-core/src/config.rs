use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::importance::DEFAULT_TOP_N;

pub const DEFAULT_MODEL_PATH: &str = "centseek_model.json";
pub const DEFAULT_PROMPT: &str = "Summarize the current state of the global economy and general public sentiment in one to two sentences.";

/// Runtime configuration.
///
/// Secrets are never stored here, only the names of the environment
/// variables that hold them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// XGBoost JSON artifact (`.json` or `.json.gz`).
    pub model_path: PathBuf,
    pub importance_top_n: usize,
    pub bind_addr: String,
    pub sentiment: SentimentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SentimentConfig {
    /// Name of the variable holding the generative-text API key.
    pub api_key_var: String,
    pub base_url: String,
    pub model: String,
    pub prompt: String,
    /// Budget for the whole primary path (generate + classify).
    pub timeout_ms: u64,

    /// Name of the variable holding the NLP inference token.
    pub nlp_api_key_var: String,
    pub nlp_base_url: String,
    pub nlp_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            importance_top_n: DEFAULT_TOP_N,
            bind_addr: "127.0.0.1:8080".to_string(),
            sentiment: SentimentConfig::default(),
        }
    }
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            api_key_var: "GOOGLE_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            timeout_ms: 5_000,
            nlp_api_key_var: "HF_API_TOKEN".to_string(),
            nlp_base_url: "https://api-inference.huggingface.co".to_string(),
            nlp_model: "distilbert-base-uncased-finetuned-sst-2-english".to_string(),
        }
    }
}

impl Config {
    /// Defaults, then `.env` (if present), then `CENTSEEK_*` variables.
    pub fn from_env() -> Self {
        if let Ok(p) = dotenv::dotenv() {
            tracing::debug!(path = %p.display(), "loaded .env");
        }
        Self::default().overlay(|k| std::env::var(k).ok())
    }

    /// JSON settings file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read settings: {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&s)
            .with_context(|| format!("parse settings: {}", path.display()))?;
        Ok(cfg)
    }

    /// Apply `CENTSEEK_*` overrides read through `lookup`.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CENTSEEK_MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        parse_into(&get, "CENTSEEK_IMPORTANCE_TOP_N", &mut self.importance_top_n);
        if let Some(v) = get("CENTSEEK_BIND") {
            self.bind_addr = v;
        }

        let s = &mut self.sentiment;
        if let Some(v) = get("CENTSEEK_SENTIMENT_API_KEY_VAR") {
            s.api_key_var = v;
        }
        if let Some(v) = get("CENTSEEK_SENTIMENT_BASE_URL") {
            s.base_url = v;
        }
        if let Some(v) = get("CENTSEEK_SENTIMENT_MODEL") {
            s.model = v;
        }
        if let Some(v) = get("CENTSEEK_SENTIMENT_PROMPT") {
            s.prompt = v;
        }
        parse_into(&get, "CENTSEEK_SENTIMENT_TIMEOUT_MS", &mut s.timeout_ms);
        if let Some(v) = get("CENTSEEK_NLP_API_KEY_VAR") {
            s.nlp_api_key_var = v;
        }
        if let Some(v) = get("CENTSEEK_NLP_BASE_URL") {
            s.nlp_base_url = v;
        }
        if let Some(v) = get("CENTSEEK_NLP_MODEL") {
            s.nlp_model = v;
        }
        self
    }
}

fn parse_into<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = get(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparsable setting"),
        }
    }
}
