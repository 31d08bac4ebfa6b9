//! Error taxonomy for adapters, normalization and capabilities.
//!
//! Provider-specific failures (`reqwest`, `serde_json`) are converted into
//! [`ProviderError`] at the adapter boundary. The orchestrator recovers from
//! those locally; only [`CapabilityError`] reaches the HTTP layer.

use thiserror::Error;

use crate::orchestrator::Attempt;

/// One adapter attempt failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} is not configured")]
    NotConfigured { provider: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(err.to_string())
    }
}

/// A raw success payload did not have a recognised shape.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("unable to parse {capability} result: {detail}")]
    UnknownShape { capability: String, detail: String },

    #[error("{capability} result contained no usable entries")]
    Empty { capability: String },
}

/// Failure of a whole capability request.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("no providers configured for {capability}; set the provider API keys in the environment")]
    NotConfigured { capability: String },

    #[error("all {capability} providers are currently unavailable ({})", describe_attempts(.attempts))]
    AllProvidersFailed {
        capability: String,
        attempts: Vec<Attempt>,
    },

    #[error("{0}")]
    Upstream(String),

    #[error("no documents have been uploaded yet")]
    NoDocuments,

    #[error("{0}")]
    Extraction(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn describe_attempts(attempts: &[Attempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.provider, a.outcome))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::AttemptOutcome;

    #[test]
    fn test_all_failed_lists_every_attempt() {
        let err = CapabilityError::AllProvidersFailed {
            capability: "summarize".to_string(),
            attempts: vec![
                Attempt {
                    provider: "huggingface:bart-cnn".to_string(),
                    outcome: AttemptOutcome::Failed("HTTP 500: boom".to_string()),
                },
                Attempt {
                    provider: "gemini".to_string(),
                    outcome: AttemptOutcome::Skipped,
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("all summarize providers are currently unavailable"));
        assert!(msg.contains("huggingface:bart-cnn: failed: HTTP 500: boom"));
        assert!(msg.contains("gemini: skipped (not configured)"));
    }

    #[test]
    fn test_normalize_error_converts_into_provider_error() {
        let err: ProviderError = NormalizeError::Empty {
            capability: "ocr".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "ocr result contained no usable entries");
    }
}
