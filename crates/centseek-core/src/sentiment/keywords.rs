use async_trait::async_trait;

use super::{Polarity, PolarityClassifier, SentimentError};
use crate::schema::SentimentLabel;

const POSITIVE: &[&str] = &[
    "boom", "bullish", "confidence", "confident", "expanding", "expansion", "gain", "gains",
    "grew", "grow", "growing", "growth", "hopeful", "improve", "improved", "improving",
    "optimism", "optimistic", "positive", "rebound", "recovering", "recovery", "resilience",
    "resilient", "robust", "stability", "stable", "strength", "strong", "upbeat",
];

const NEGATIVE: &[&str] = &[
    "anxiety", "anxious", "bearish", "concern", "concerns", "contraction", "crisis", "debt",
    "decline", "declining", "default", "defaults", "downturn", "fear", "fears", "gloomy",
    "inflation", "inflationary", "layoffs", "negative", "pessimism", "pessimistic",
    "recession", "slowdown", "slowing", "stagnant", "stagnation", "struggle", "struggling",
    "uncertain", "uncertainty", "unemployment", "volatile", "volatility", "weak", "weakness",
    "worried", "worries",
];

/// Words that flip the polarity of a keyword shortly after them.
const NEGATORS: &[&str] = &["no", "not", "never", "without", "hardly", "isn", "aren", "wasn", "weren"];
const NEGATION_WINDOW: usize = 3;

/// Offline lexicon classifier. Deterministic and infallible.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn polarity(&self, text: &str) -> Polarity {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let (mut pos, mut neg) = (0u32, 0u32);
        let mut negated_until = 0usize;
        for (i, tok) in tokens.iter().enumerate() {
            if NEGATORS.contains(tok) {
                negated_until = i + NEGATION_WINDOW + 1;
                continue;
            }
            let hit = if POSITIVE.contains(tok) {
                Some(true)
            } else if NEGATIVE.contains(tok) {
                Some(false)
            } else {
                None
            };
            if let Some(is_pos) = hit {
                if is_pos != (i < negated_until) {
                    pos += 1;
                } else {
                    neg += 1;
                }
                negated_until = 0;
            }
        }

        let total = f64::from(pos + neg);
        if total == 0.0 {
            return Polarity {
                label: SentimentLabel::Neutral,
                score: 0.0,
            };
        }
        let (label, score) = if pos > neg {
            (SentimentLabel::Positive, f64::from(pos) / total)
        } else if neg > pos {
            (SentimentLabel::Negative, f64::from(neg) / total)
        } else {
            (SentimentLabel::Neutral, 0.5)
        };
        Polarity { label, score }
    }
}

#[async_trait]
impl PolarityClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Polarity, SentimentError> {
        Ok(self.polarity(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(text: &str) -> SentimentLabel {
        KeywordClassifier::new().polarity(text).label
    }

    #[test]
    fn test_no_keywords_is_neutral_zero() {
        let p = KeywordClassifier::new().polarity("The committee met on Tuesday.");
        assert_eq!(p.label, SentimentLabel::Neutral);
        assert_eq!(p.score, 0.0);
        assert_eq!(KeywordClassifier::new().polarity("").label, SentimentLabel::Neutral);
    }

    #[test]
    fn test_clear_polarity() {
        assert_eq!(
            label("The global economy shows robust growth and consumer confidence is strong."),
            SentimentLabel::Positive
        );
        assert_eq!(
            label("Recession fears rise as inflation and unemployment weigh on households."),
            SentimentLabel::Negative
        );
    }

    #[test]
    fn test_negation_flips() {
        assert_eq!(label("Growth is not strong"), SentimentLabel::Neutral);
        assert_eq!(label("The outlook is not strong."), SentimentLabel::Negative);
        assert_eq!(label("There is no recession in sight."), SentimentLabel::Positive);
    }

    #[test]
    fn test_tie_is_neutral() {
        let p = KeywordClassifier::new().polarity("Strong jobs data, persistent inflation.");
        assert_eq!(p.label, SentimentLabel::Neutral);
        assert_eq!(p.score, 0.5);
    }

    #[test]
    fn test_deterministic() {
        let text = "Cautious optimism amid uncertainty and slowing growth.";
        let c = KeywordClassifier::new();
        assert_eq!(c.polarity(text), c.polarity(text));
    }
}
