use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{
    GeminiClient, HfClassifier, KeywordClassifier, Polarity, PolarityClassifier, SentimentError,
    TextGenerator,
};
use crate::config::SentimentConfig;
use crate::schema::{SentimentResult, SentimentSource};
use crate::util::now_us;

/// Lifecycle of one `get_sentiment` call.
///
/// `Idle → RequestingPrimary → Succeeded`, or
/// `Idle → RequestingPrimary → FallingBack → RequestingFallback → Succeeded`.
/// The fallback classifier cannot fail, so there is no terminal failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Idle,
    RequestingPrimary,
    FallingBack,
    RequestingFallback,
    Succeeded,
}

struct Trail(Vec<GatewayState>);

impl Trail {
    fn new() -> Self {
        Trail(vec![GatewayState::Idle])
    }

    fn enter(&mut self, s: GatewayState) {
        tracing::debug!(from = ?self.0.last(), to = ?s, "sentiment gateway");
        self.0.push(s);
    }
}

/// Primary failure plus any text that made it back before it.
struct PrimaryFailure {
    text: Option<String>,
    error: SentimentError,
}

pub struct SentimentGateway {
    generator: Option<Arc<dyn TextGenerator>>,
    classifier: Option<Arc<dyn PolarityClassifier>>,
    fallback: KeywordClassifier,
    timeout: Duration,
}

impl SentimentGateway {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        classifier: Option<Arc<dyn PolarityClassifier>>,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            classifier,
            fallback: KeywordClassifier::new(),
            timeout,
        }
    }

    /// No remote services; every answer comes from the keyword classifier.
    pub fn offline() -> Self {
        Self::new(None, None, Duration::ZERO)
    }

    /// Builds remote clients when their credentials are present. Missing
    /// credentials are logged and leave the gateway on its fallback.
    pub fn from_config(cfg: &SentimentConfig) -> Self {
        let generator: Option<Arc<dyn TextGenerator>> = match GeminiClient::from_config(cfg) {
            Ok(c) => Some(Arc::new(c)),
            Err(e) => {
                tracing::warn!(error = %e, "text generator disabled; sentiment will use fallback");
                None
            }
        };
        let classifier: Option<Arc<dyn PolarityClassifier>> = match HfClassifier::from_config(cfg) {
            Ok(c) => Some(Arc::new(c)),
            Err(e) => {
                tracing::warn!(error = %e, "remote polarity classifier disabled");
                None
            }
        };
        Self::new(generator, classifier, Duration::from_millis(cfg.timeout_ms))
    }

    pub fn has_primary(&self) -> bool {
        self.generator.is_some() && self.classifier.is_some()
    }

    /// Never fails: any primary problem resolves to a fallback result.
    pub async fn get_sentiment(&self, query: &str) -> SentimentResult {
        self.get_sentiment_traced(query).await.0
    }

    /// [`Self::get_sentiment`] plus the states it passed through.
    pub async fn get_sentiment_traced(&self, query: &str) -> (SentimentResult, Vec<GatewayState>) {
        let t0 = Instant::now();
        let mut trail = Trail::new();

        trail.enter(GatewayState::RequestingPrimary);
        let deadline = tokio::time::Instant::now() + self.timeout;
        let primary = self.primary(query, deadline).await;

        let result = match primary {
            Ok((text, p)) => {
                metrics::counter!("sentiment_primary_total").increment(1);
                SentimentResult {
                    label: p.label,
                    score: p.score,
                    source: SentimentSource::Primary,
                    raw_text: text,
                    fallback_reason: None,
                }
            }
            Err(PrimaryFailure { text, error }) => {
                trail.enter(GatewayState::FallingBack);
                tracing::warn!(error = %error, "sentiment primary path failed; using fallback");
                metrics::counter!("sentiment_fallback_total").increment(1);

                trail.enter(GatewayState::RequestingFallback);
                let subject = text.unwrap_or_else(|| query.to_string());
                let p = self.fallback.polarity(&subject);
                SentimentResult {
                    label: p.label,
                    score: p.score,
                    source: SentimentSource::Fallback,
                    raw_text: subject,
                    fallback_reason: Some(error.to_string()),
                }
            }
        };

        trail.enter(GatewayState::Succeeded);
        metrics::histogram!("sentiment_us").record(now_us(t0) as f64);
        (result, trail.0)
    }

    /// Both remote calls share one deadline. Text that arrived before it
    /// passes survives a late or failed classification.
    async fn primary(
        &self,
        query: &str,
        deadline: tokio::time::Instant,
    ) -> Result<(String, Polarity), PrimaryFailure> {
        let generator = self.generator.as_ref().ok_or_else(|| PrimaryFailure {
            text: None,
            error: SentimentError::Unavailable("no text generator configured".to_string()),
        })?;
        let text = match tokio::time::timeout_at(deadline, generator.generate(query)).await {
            Ok(r) => r.map_err(|error| PrimaryFailure { text: None, error })?,
            Err(_) => {
                return Err(PrimaryFailure {
                    text: None,
                    error: SentimentError::Timeout(self.timeout),
                })
            }
        };

        let Some(classifier) = self.classifier.as_ref() else {
            return Err(PrimaryFailure {
                text: Some(text),
                error: SentimentError::Unavailable("no polarity classifier configured".to_string()),
            });
        };
        match tokio::time::timeout_at(deadline, classifier.classify(&text)).await {
            Ok(Ok(p)) => Ok((text, p)),
            Ok(Err(error)) => Err(PrimaryFailure {
                text: Some(text),
                error,
            }),
            Err(_) => Err(PrimaryFailure {
                text: Some(text),
                error: SentimentError::Timeout(self.timeout),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SentimentLabel;
    use async_trait::async_trait;
    use GatewayState::*;

    struct FixedText(&'static str);

    #[async_trait]
    impl TextGenerator for FixedText {
        async fn generate(&self, _: &str) -> Result<String, SentimentError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingText(SentimentError);

    #[async_trait]
    impl TextGenerator for FailingText {
        async fn generate(&self, _: &str) -> Result<String, SentimentError> {
            Err(self.0.clone())
        }
    }

    struct SlowText;

    #[async_trait]
    impl TextGenerator for SlowText {
        async fn generate(&self, _: &str) -> Result<String, SentimentError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    struct FixedPolarity(SentimentLabel, f64);

    #[async_trait]
    impl PolarityClassifier for FixedPolarity {
        async fn classify(&self, _: &str) -> Result<Polarity, SentimentError> {
            Ok(Polarity {
                label: self.0,
                score: self.1,
            })
        }
    }

    struct FailingPolarity;

    #[async_trait]
    impl PolarityClassifier for FailingPolarity {
        async fn classify(&self, _: &str) -> Result<Polarity, SentimentError> {
            Err(SentimentError::Quota)
        }
    }

    fn gateway(
        g: impl TextGenerator + 'static,
        c: impl PolarityClassifier + 'static,
        timeout: Duration,
    ) -> SentimentGateway {
        SentimentGateway::new(Some(Arc::new(g)), Some(Arc::new(c)), timeout)
    }

    #[tokio::test]
    async fn test_primary_success() {
        let gw = gateway(
            FixedText("Markets are calm."),
            FixedPolarity(SentimentLabel::Positive, 0.98),
            Duration::from_secs(1),
        );
        let (r, trail) = gw.get_sentiment_traced("q").await;
        assert_eq!(r.source, SentimentSource::Primary);
        assert_eq!(r.label, SentimentLabel::Positive);
        assert_eq!(r.score, 0.98);
        assert_eq!(r.raw_text, "Markets are calm.");
        assert!(r.fallback_reason.is_none());
        assert_eq!(trail, vec![Idle, RequestingPrimary, Succeeded]);
    }

    #[tokio::test]
    async fn test_generator_error_falls_back_on_query() {
        let gw = gateway(
            FailingText(SentimentError::Auth(401)),
            FixedPolarity(SentimentLabel::Positive, 0.9),
            Duration::from_secs(1),
        );
        let (r, trail) = gw.get_sentiment_traced("recession worries").await;
        assert_eq!(r.source, SentimentSource::Fallback);
        assert_eq!(r.label, SentimentLabel::Negative);
        assert_eq!(r.raw_text, "recession worries");
        assert!(r.fallback_reason.unwrap().contains("401"));
        assert_eq!(
            trail,
            vec![Idle, RequestingPrimary, FallingBack, RequestingFallback, Succeeded]
        );
    }

    #[tokio::test]
    async fn test_classifier_error_reuses_generated_text() {
        let gw = gateway(
            FixedText("Robust growth and strong hiring."),
            FailingPolarity,
            Duration::from_secs(1),
        );
        let r = gw.get_sentiment("q").await;
        assert_eq!(r.source, SentimentSource::Fallback);
        assert_eq!(r.label, SentimentLabel::Positive);
        assert_eq!(r.raw_text, "Robust growth and strong hiring.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let gw = gateway(
            SlowText,
            FixedPolarity(SentimentLabel::Positive, 0.9),
            Duration::from_millis(200),
        );
        let r = gw.get_sentiment("Summarize the economy.").await;
        assert_eq!(r.source, SentimentSource::Fallback);
        assert_eq!(r.label, SentimentLabel::Neutral);
        assert!(r.fallback_reason.unwrap().contains("timed out"));
    }

    struct SlowPolarity;

    #[async_trait]
    impl PolarityClassifier for SlowPolarity {
        async fn classify(&self, _: &str) -> Result<Polarity, SentimentError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Polarity {
                label: SentimentLabel::Negative,
                score: 1.0,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_classifier_keeps_generated_text() {
        let gw = gateway(
            FixedText("Robust growth and strong hiring."),
            SlowPolarity,
            Duration::from_millis(200),
        );
        let (r, trail) = gw.get_sentiment_traced("Summarize the economy.").await;
        assert_eq!(r.source, SentimentSource::Fallback);
        assert_eq!(r.raw_text, "Robust growth and strong hiring.");
        assert_eq!(r.label, SentimentLabel::Positive);
        assert_eq!(
            r.fallback_reason.as_deref(),
            Some("request timed out after 200ms")
        );
        assert_eq!(
            trail,
            vec![Idle, RequestingPrimary, FallingBack, RequestingFallback, Succeeded]
        );
    }

    #[tokio::test]
    async fn test_offline_gateway() {
        let gw = SentimentGateway::offline();
        assert!(!gw.has_primary());
        let r = gw.get_sentiment("anything").await;
        assert_eq!(r.source, SentimentSource::Fallback);
        assert_eq!(r.label, SentimentLabel::Neutral);
        assert_eq!(r.score, 0.0);
    }
}
