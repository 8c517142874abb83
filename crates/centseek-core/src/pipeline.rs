use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::{
    categorize,
    config::Config,
    error::{CentseekError, Result},
    features, importance, indicators,
    model::{self, Scorer},
    schema::{
        Evaluation, FeatureImportance, RawCustomerInput, RiskReport, SecondaryIndicators,
        SentimentResult, TimingsUs,
    },
    sentiment::SentimentGateway,
    util::now_us,
};

/// One evaluation service: risk scoring plus the sentiment signal.
#[derive(Clone)]
pub struct AppCore {
    pub cfg: Config,
    /// Injected scorer; `None` means the process-wide model at `cfg.model_path`.
    scorer: Option<Arc<dyn Scorer>>,
    sentiment: Arc<SentimentGateway>,
}

impl AppCore {
    /// Model loads lazily from `cfg.model_path` on first use; remote
    /// sentiment clients are built from whatever credentials are present.
    pub fn new(cfg: Config) -> Self {
        let sentiment = SentimentGateway::from_config(&cfg.sentiment);
        Self {
            cfg,
            scorer: None,
            sentiment: Arc::new(sentiment),
        }
    }

    pub fn with_parts(
        cfg: Config,
        scorer: Option<Arc<dyn Scorer>>,
        sentiment: SentimentGateway,
    ) -> Self {
        Self {
            cfg,
            scorer,
            sentiment: Arc::new(sentiment),
        }
    }

    pub fn scorer(&self) -> Result<Arc<dyn Scorer>> {
        match &self.scorer {
            Some(s) => Ok(Arc::clone(s)),
            None => {
                let h: Arc<dyn Scorer> = model::load(&self.cfg.model_path)?;
                Ok(h)
            }
        }
    }

    /// Whether both remote sentiment services are configured.
    pub fn sentiment_primary(&self) -> bool {
        self.sentiment.has_primary()
    }

    /// Risk half: validate → assemble → score → categorize → importance.
    pub fn score_risk(&self, raw: &RawCustomerInput) -> Result<RiskReport> {
        let mut timings = TimingsUs::default();

        let t_val = Instant::now();
        features::validate(raw).inspect_err(|e| {
            metrics::counter!("evaluate_validation_failed_total").increment(1);
            tracing::info!(error = %e, "rejected customer input");
        })?;
        timings.validate = now_us(t_val);
        metrics::histogram!("stage_validate_us").record(timings.validate as f64);

        let scorer = self.scorer().inspect_err(|_| {
            metrics::counter!("evaluate_model_unavailable_total").increment(1);
        })?;

        let t_feat = Instant::now();
        let fv = features::assemble(scorer.schema(), raw)?;
        timings.feature = now_us(t_feat);
        metrics::histogram!("stage_feature_us").record(timings.feature as f64);

        let t_score = Instant::now();
        let probability = model::score(scorer.as_ref(), &fv).inspect_err(|e| {
            tracing::error!(error = %e, "risk inference failed");
        })?;
        let assessment = categorize::assess(probability)?;
        timings.score = now_us(t_score);
        metrics::histogram!("stage_score_us").record(timings.score as f64);

        let t_imp = Instant::now();
        let importance = importance::top_features(scorer.as_ref(), self.cfg.importance_top_n);
        timings.importance = now_us(t_imp);
        metrics::histogram!("stage_importance_us").record(timings.importance as f64);

        tracing::debug!(
            probability,
            category = ?assessment.category(),
            "scored customer"
        );

        Ok(RiskReport {
            assessment,
            importance,
            timings_us: timings,
        })
    }

    /// Indicators need only valid input, not the model.
    pub fn indicators(&self, raw: &RawCustomerInput) -> Result<SecondaryIndicators> {
        features::validate(raw)?;
        Ok(indicators::compute(raw))
    }

    pub fn top_features(&self, n: usize) -> Result<FeatureImportance> {
        let scorer = self.scorer()?;
        Ok(importance::top_features(scorer.as_ref(), n))
    }

    pub async fn sentiment(&self) -> SentimentResult {
        self.sentiment.get_sentiment(&self.cfg.sentiment.prompt).await
    }

    /// Full evaluation. A failing risk half still returns the sentiment half,
    /// and the other way round.
    pub async fn evaluate(&self, raw: &RawCustomerInput) -> Evaluation {
        let t0 = Instant::now();
        metrics::counter!("evaluate_total").increment(1);
        let trace_id = Uuid::new_v4();

        let risk_half = async {
            let indicators = self.indicators(raw).ok();
            (indicators, self.score_risk(raw))
        };
        let ((indicators, risk), sentiment) = tokio::join!(risk_half, self.sentiment());

        let (risk, risk_error) = match risk {
            Ok(r) => (Some(r), None),
            Err(e) => {
                if matches!(e, CentseekError::ModelLoad(_)) {
                    tracing::error!(%trace_id, error = %e, "risk scoring disabled");
                }
                (None, Some(e.report()))
            }
        };

        metrics::histogram!("e2e_us").record(now_us(t0) as f64);

        Evaluation {
            trace_id,
            risk,
            risk_error,
            indicators,
            sentiment,
        }
    }
}
