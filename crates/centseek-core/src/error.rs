use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CentseekError>;

/// Failure taxonomy of the risk half of an evaluation.
///
/// Sentiment failures live in [`crate::sentiment::SentimentError`] and never
/// reach this type: the gateway always resolves them through its fallback.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CentseekError {
    /// Bad user input; `field` names the offending value (e.g. `delays[3]`).
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Artifact missing, unreadable, or incompatible with the assembler.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    /// Probability outside [0, 1] reached the categorizer.
    #[error("probability {0} outside [0, 1]")]
    Domain(f64),
}

impl CentseekError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CentseekError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn model_load(msg: impl Into<String>) -> Self {
        CentseekError::ModelLoad(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        CentseekError::Inference(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CentseekError::Validation { .. } => ErrorKind::Validation,
            CentseekError::ModelLoad(_) => ErrorKind::ModelLoad,
            CentseekError::Inference(_) => ErrorKind::Inference,
            CentseekError::Domain(_) => ErrorKind::Domain,
        }
    }

    /// Wording shown to the person who submitted the form.
    pub fn user_message(&self) -> String {
        match self {
            CentseekError::Validation { field, reason } => format!("{field}: {reason}"),
            CentseekError::ModelLoad(_) => {
                "risk model is unavailable; scoring is disabled until it is restored".to_string()
            }
            CentseekError::Inference(_) | CentseekError::Domain(_) => {
                "unable to compute risk".to_string()
            }
        }
    }

    pub fn report(&self) -> ErrorReport {
        let field = match self {
            CentseekError::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };
        ErrorReport {
            kind: self.kind(),
            field,
            message: self.user_message(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ModelLoad,
    Inference,
    Domain,
}

/// Serializable, user-facing view of a [`CentseekError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}
