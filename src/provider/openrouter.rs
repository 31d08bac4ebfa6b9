use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;

use super::sse::{data_lines, stop_after_error};
use super::{ensure_success, join_url, read_json, TextStream};
use crate::config::ProvidersConfig;
use crate::error::ProviderError;
use crate::models::ChatMessage;

pub const PROVIDER: &str = "openrouter";

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    stream: bool,
}

/// Client for OpenRouter's OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    key: Option<String>,
    referer: String,
    app_title: String,
}

impl OpenRouterClient {
    pub fn new(http: reqwest::Client, config: &ProvidersConfig, key: Option<String>) -> Self {
        Self {
            http,
            base_url: config.openrouter_url.clone(),
            key,
            referer: config.referer.clone(),
            app_title: config.app_title.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    async fn send(&self, body: &CompletionRequest<'_>) -> Result<reqwest::Response, ProviderError> {
        let key = self.key.as_deref().ok_or_else(|| ProviderError::NotConfigured {
            provider: PROVIDER.to_string(),
        })?;
        Ok(self
            .http
            .post(join_url(&self.base_url, "chat/completions"))
            .bearer_auth(key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_title)
            .json(body)
            .send()
            .await?)
    }

    /// Buffered completion; returns the first choice's message content.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: Option<f64>,
    ) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            model,
            messages,
            temperature,
            stream: false,
        };
        let json = read_json(self.send(&request).await?).await?;
        if let Some(message) = embedded_error(&json) {
            return Err(ProviderError::InvalidResponse(message));
        }
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("completion had no message content".to_string()))
    }

    /// Streamed completion; yields `choices[0].delta.content` fragments.
    pub async fn stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: Option<f64>,
    ) -> Result<TextStream, ProviderError> {
        let request = CompletionRequest {
            model,
            messages,
            temperature,
            stream: true,
        };
        let response = ensure_success(self.send(&request).await?).await?;

        let fragments = data_lines(Box::pin(response.bytes_stream()))
            .filter_map(|item| async move {
                match item.and_then(|data| parse_delta(&data)) {
                    Ok(text) if text.is_empty() => None,
                    other => Some(other),
                }
            })
            .boxed();
        Ok(stop_after_error(fragments))
    }
}

/// OpenRouter reports some upstream failures inside a 200 body.
fn embedded_error(json: &Value) -> Option<String> {
    let err = json.get("error")?;
    Some(
        err.get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("provider returned an error")
            .to_string(),
    )
}

fn parse_delta(data: &str) -> Result<String, ProviderError> {
    let json: Value = serde_json::from_str(data)?;
    if let Some(message) = embedded_error(&json) {
        return Err(ProviderError::InvalidResponse(message));
    }
    Ok(json
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}
