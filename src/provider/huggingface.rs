use serde_json::{json, Value};
use std::time::Duration;

use super::{ensure_success, join_url, read_json};
use crate::config::ProvidersConfig;
use crate::error::ProviderError;

pub const PROVIDER: &str = "huggingface";

/// Client for the hosted Hugging Face Inference API.
#[derive(Clone)]
pub struct HuggingFaceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    warmup_attempts: u32,
    warmup_delay: Duration,
}

impl HuggingFaceClient {
    pub fn new(http: reqwest::Client, config: &ProvidersConfig, token: Option<String>) -> Self {
        Self {
            http,
            base_url: config.huggingface_url.clone(),
            token,
            warmup_attempts: config.warmup_attempts,
            warmup_delay: Duration::from_millis(config.warmup_delay_ms),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Result<&str, ProviderError> {
        self.token
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured {
                provider: PROVIDER.to_string(),
            })
    }

    fn model_url(&self, model: &str) -> String {
        join_url(&self.base_url, &format!("models/{}", model))
    }

    /// POST a JSON payload to a model and return the raw JSON answer.
    pub async fn infer_json(&self, model: &str, payload: &Value) -> Result<Value, ProviderError> {
        let token = self.token()?;
        let response = self
            .http
            .post(self.model_url(model))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        read_json(response).await
    }

    /// POST raw bytes (e.g. an image) to a model.
    pub async fn infer_bytes(
        &self,
        model: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Value, ProviderError> {
        let token = self.token()?;
        let response = self
            .http
            .post(self.model_url(model))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// Make sure a model is reachable and give it a chance to load.
    ///
    /// Sends a status probe first; a non-success status fails the call. Then
    /// posts a tiny input up to `warmup_attempts` times, sleeping between
    /// probes while the model reports that it is still loading. A model that
    /// is still loading after the last probe is called anyway.
    pub async fn wait_until_loaded(&self, model: &str) -> Result<(), ProviderError> {
        let token = self.token()?;
        let url = self.model_url(model);

        let status = self.http.get(&url).bearer_auth(token).send().await?;
        ensure_success(status).await?;

        for attempt in 1..=self.warmup_attempts {
            let response = self
                .http
                .post(&url)
                .bearer_auth(token)
                .json(&json!({ "inputs": "Test" }))
                .send()
                .await?;
            let body = response.text().await.unwrap_or_default();
            if !reports_loading(&body) {
                return Ok(());
            }
            tracing::debug!(model, attempt, "model still loading");
            if attempt < self.warmup_attempts {
                tokio::time::sleep(self.warmup_delay).await;
            }
        }

        tracing::warn!(model, "model still loading after warm-up; calling anyway");
        Ok(())
    }
}

fn reports_loading(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(|e| e.contains("loading")))
        .unwrap_or(false)
}
