//! Market-sentiment signal: a generated economic summary plus its polarity.
//!
//! The remote pieces sit behind two traits so the gateway can run with any,
//! all, or none of them. Whatever happens remotely, the keyword classifier
//! produces an answer.

mod gateway;
mod gemini;
mod hf;
mod keywords;

pub use gateway::{GatewayState, SentimentGateway};
pub use gemini::GeminiClient;
pub use hf::HfClassifier;
pub use keywords::KeywordClassifier;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::schema::SentimentLabel;

/// Remote failures on the primary path. Messages carry status codes and
/// variable names only, never key material.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SentimentError {
    #[error("sentiment unavailable: {0}")]
    Unavailable(String),

    #[error("credential variable `{0}` is not set")]
    MissingCredentials(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication rejected (HTTP {0})")]
    Auth(u16),

    #[error("quota exhausted (HTTP 429)")]
    Quota,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("unreadable response: {0}")]
    Parse(String),
}

impl SentimentError {
    pub(crate) fn from_status(code: u16) -> Self {
        match code {
            401 | 403 => SentimentError::Auth(code),
            429 => SentimentError::Quota,
            _ => SentimentError::Status(code),
        }
    }

    /// reqwest errors print the request URL; strip it before keeping the text.
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return SentimentError::Network("request timed out".to_string());
        }
        SentimentError::Network(e.without_url().to_string())
    }
}

/// Label and confidence for one piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polarity {
    pub label: SentimentLabel,
    pub score: f64,
}

/// Produces a short economic-sentiment statement for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, SentimentError>;
}

/// Classifies free text into a polarity.
#[async_trait]
pub trait PolarityClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Polarity, SentimentError>;
}

/// Maps model-specific labels (`POSITIVE`, `neg`, `LABEL_2`, ..) to ours.
pub(crate) fn label_from_str(s: &str) -> SentimentLabel {
    let l = s.trim().to_ascii_lowercase();
    if l.starts_with("pos") || l == "label_2" {
        SentimentLabel::Positive
    } else if l.starts_with("neg") || l == "label_0" {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mapping() {
        assert_eq!(label_from_str("POSITIVE"), SentimentLabel::Positive);
        assert_eq!(label_from_str("negative"), SentimentLabel::Negative);
        assert_eq!(label_from_str("LABEL_0"), SentimentLabel::Negative);
        assert_eq!(label_from_str("LABEL_1"), SentimentLabel::Neutral);
        assert_eq!(label_from_str("mixed"), SentimentLabel::Neutral);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(SentimentError::from_status(401), SentimentError::Auth(401));
        assert_eq!(SentimentError::from_status(403), SentimentError::Auth(403));
        assert_eq!(SentimentError::from_status(429), SentimentError::Quota);
        assert_eq!(SentimentError::from_status(503), SentimentError::Status(503));
    }
}
