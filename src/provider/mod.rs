//! HTTP clients for the external inference providers.
//!
//! | Client | Provider | Used by |
//! |--------|----------|---------|
//! | [`HuggingFaceClient`] | Hugging Face Inference API | classify, summarize, ocr |
//! | [`GeminiClient`] | Google Gemini | classify, summarize, ocr, chat |
//! | [`OpenRouterClient`] | OpenRouter (OpenAI-compatible) | chat, qna, rag, memory |
//!
//! Clients only speak HTTP. Capability-specific request building and the
//! [`Adapter`](crate::orchestrator::Adapter) implementations live next to each
//! capability. Every failure is returned as a [`ProviderError`]; no
//! `reqwest` or `serde_json` error escapes this module.

mod gemini;
mod huggingface;
mod openrouter;
pub mod sse;

pub use gemini::{GeminiClient, GeminiContent};
pub use huggingface::HuggingFaceClient;
pub use openrouter::OpenRouterClient;

use futures_util::stream::BoxStream;
use serde_json::Value;
use std::time::Duration;

use crate::config::ProvidersConfig;
use crate::error::ProviderError;

/// Lazy, finite, non-restartable sequence of generated text fragments.
///
/// A failure after the stream started arrives as a terminal `Err` item;
/// fragments already yielded stay delivered.
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

/// Longest provider error body echoed back in messages.
const MAX_ERROR_CHARS: usize = 300;

/// Build the shared outbound HTTP client.
pub fn http_client(config: &ProvidersConfig) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// Turn a non-2xx response into [`ProviderError::Http`].
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Http {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Read a successful JSON body.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value, ProviderError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<Value>().await?)
}

/// Best human-readable message from an error body: `error` or
/// `error.message` when the body is JSON, otherwise the truncated text.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let err = json.get("error");
        if let Some(msg) = err.and_then(|e| e.as_str()) {
            return msg.to_string();
        }
        if let Some(msg) = err.and_then(|e| e.get("message")).and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_CHARS).collect()
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
