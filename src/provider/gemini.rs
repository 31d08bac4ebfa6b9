use base64::Engine;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;

use super::sse::{data_lines, stop_after_error};
use super::{ensure_success, join_url, read_json, TextStream};
use crate::config::ProvidersConfig;
use crate::error::ProviderError;
use crate::models::{ChatMessage, Role};

pub const PROVIDER: &str = "gemini";

/// One turn of a Gemini conversation.
#[derive(Debug, Clone, Serialize)]
pub struct GeminiContent {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl GeminiContent {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Prompt followed by an inline base64 image.
    pub fn user_with_image(prompt: impl Into<String>, mime_type: &str, image: &[u8]) -> Self {
        Self {
            role: "user",
            parts: vec![
                Part::Text(prompt.into()),
                Part::InlineData(InlineData {
                    mime_type: mime_type.to_string(),
                    data: base64::engine::general_purpose::STANDARD.encode(image),
                }),
            ],
        }
    }

    /// Gemini only knows `user` and `model`; assistant turns map to `model`
    /// and everything else to `user`.
    pub fn from_message(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::Assistant => "model",
            Role::User | Role::System => "user",
        };
        Self {
            role,
            parts: vec![Part::Text(message.content.clone())],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [GeminiContent],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

/// Client for the Gemini `generateContent` family of endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    key: Option<String>,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, config: &ProvidersConfig, key: Option<String>) -> Self {
        Self {
            http,
            base_url: config.gemini_url.clone(),
            model: config.gemini_model.clone(),
            key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.key.as_deref().ok_or_else(|| ProviderError::NotConfigured {
            provider: PROVIDER.to_string(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        join_url(
            &self.base_url,
            &format!("v1beta/models/{}:{}", self.model, method),
        )
    }

    async fn post(
        &self,
        url: String,
        system: Option<&str>,
        contents: &[GeminiContent],
    ) -> Result<reqwest::Response, ProviderError> {
        let key = self.key()?;
        let body = GenerateRequest {
            contents,
            system_instruction: system.map(|text| SystemInstruction {
                parts: vec![Part::Text(text.to_string())],
            }),
        };
        Ok(self
            .http
            .post(url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await?)
    }

    /// Buffered generation; returns the concatenated candidate text.
    pub async fn generate(
        &self,
        system: Option<&str>,
        contents: &[GeminiContent],
    ) -> Result<String, ProviderError> {
        let response = self.post(self.endpoint("generateContent"), system, contents).await?;
        let json = read_json(response).await?;
        candidate_text(&json).ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .map(|r| format!("prompt blocked: {}", r))
                .unwrap_or_else(|| "response contained no candidate text".to_string());
            ProviderError::InvalidResponse(reason)
        })
    }

    /// Single-turn text prompt.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        self.generate(None, &[GeminiContent::user_text(prompt)]).await
    }

    /// Streamed generation over server-sent events.
    pub async fn stream(
        &self,
        system: Option<&str>,
        contents: &[GeminiContent],
    ) -> Result<TextStream, ProviderError> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = ensure_success(self.post(url, system, contents).await?).await?;

        let fragments = data_lines(Box::pin(response.bytes_stream()))
            .filter_map(|item| async move {
                match item.and_then(|data| parse_stream_chunk(&data)) {
                    Ok(text) if text.is_empty() => None,
                    other => Some(other),
                }
            })
            .boxed();
        Ok(stop_after_error(fragments))
    }
}

fn candidate_text(json: &Value) -> Option<String> {
    let parts = json.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Some(text)
}

fn parse_stream_chunk(data: &str) -> Result<String, ProviderError> {
    let json: Value = serde_json::from_str(data)?;
    if let Some(err) = json.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("stream error");
        return Err(ProviderError::InvalidResponse(message.to_string()));
    }
    Ok(candidate_text(&json).unwrap_or_default())
}
