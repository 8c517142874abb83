// crates/centseek-core/src/sentiment/gemini.rs
//
// Generative-text client for the Gemini `generateContent` REST endpoint.
// The API key travels in the `x-goog-api-key` header, never in the URL.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{SentimentError, TextGenerator};
use crate::config::SentimentConfig;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<PartOut<'a>>,
}

#[derive(Debug, Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Debug, Deserialize)]
struct PartIn {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
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
            api_key: api_key.into(),
        })
    }

    /// Reads the key from the variable named by `cfg.api_key_var`.
    pub fn from_config(cfg: &SentimentConfig) -> Result<Self, SentimentError> {
        let key = std::env::var(&cfg.api_key_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SentimentError::MissingCredentials(cfg.api_key_var.clone()))?;
        Self::new(
            cfg.base_url.clone(),
            cfg.model.clone(),
            key,
            Duration::from_millis(cfg.timeout_ms),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, SentimentError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![PartOut { text: prompt }],
            }],
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(SentimentError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SentimentError::from_status(status.as_u16()));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| SentimentError::Parse(e.without_url().to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(SentimentError::Parse("no candidate text".to_string()));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_key() {
        let c = GeminiClient::new(
            "https://example.test/",
            "gemini-2.0-flash",
            "sk-secret-123",
            Duration::from_secs(1),
        )
        .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret-123"));
        assert!(dbg.contains("<redacted>"));
        assert_eq!(
            c.endpoint(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_missing_key_names_variable_only() {
        let cfg = SentimentConfig {
            api_key_var: "CENTSEEK_TEST_UNSET_GEMINI_KEY".to_string(),
            ..SentimentConfig::default()
        };
        let err = GeminiClient::from_config(&cfg).unwrap_err();
        assert_eq!(
            err,
            SentimentError::MissingCredentials("CENTSEEK_TEST_UNSET_GEMINI_KEY".to_string())
        );
    }
}
