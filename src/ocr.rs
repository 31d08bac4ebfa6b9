//! Optical character recognition.
//!
//! Chain: selected Hugging Face model, then `trocr-base` and `trocr-large`
//! unless already tried, then Gemini vision.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{CapabilityError, NormalizeError, ProviderError};
use crate::models::{OcrModel, OcrResult};
use crate::normalize::extract_generated_text;
use crate::orchestrator::{Adapter, Chain, ChainSuccess};
use crate::provider::{GeminiClient, GeminiContent, HuggingFaceClient};

/// Confidence reported for recognised text; providers give none.
pub const OCR_CONFIDENCE: u8 = 95;
pub const OCR_LANGUAGE: &str = "en";

const GEMINI_PROMPT: &str =
    "Extract all text from this image, preserving the original formatting as much as possible.";

/// Uploaded image plus the requested model key.
#[derive(Debug, Clone)]
pub struct OcrRequest {
    pub image: Vec<u8>,
    pub mime_type: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OcrInput {
    pub image: Vec<u8>,
    pub mime_type: String,
    pub model: OcrModel,
}

impl OcrRequest {
    pub fn validate(self) -> Result<OcrInput, CapabilityError> {
        if self.image.is_empty() {
            return Err(CapabilityError::InvalidInput("No file uploaded".to_string()));
        }
        let mime_type = self
            .mime_type
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if !mime_type.starts_with("image/") {
            return Err(CapabilityError::InvalidInput(format!(
                "Unsupported file type: {}. Please upload an image.",
                if mime_type.is_empty() { "unknown" } else { mime_type.as_str() }
            )));
        }
        let model = match self.model.as_deref() {
            None | Some("") => OcrModel::default(),
            Some(key) => OcrModel::from_key(key).unwrap_or_else(|| {
                tracing::warn!(model = key, "unknown OCR model; using the default");
                OcrModel::default()
            }),
        };
        Ok(OcrInput {
            image: self.image,
            mime_type,
            model,
        })
    }
}

pub struct HuggingFaceOcr {
    client: HuggingFaceClient,
    model: OcrModel,
    name: String,
}

impl HuggingFaceOcr {
    pub fn new(client: HuggingFaceClient, model: OcrModel) -> Self {
        Self {
            client,
            model,
            name: format!("huggingface:{}", model.key()),
        }
    }
}

#[async_trait]
impl Adapter<OcrInput, String> for HuggingFaceOcr {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn call(&self, input: &OcrInput) -> Result<String, ProviderError> {
        let raw = self
            .client
            .infer_bytes(
                self.model.huggingface_model(),
                input.image.clone(),
                &input.mime_type,
            )
            .await?;
        Ok(extract_generated_text(&raw)?)
    }
}

pub struct GeminiOcr {
    client: GeminiClient,
}

impl GeminiOcr {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter<OcrInput, String> for GeminiOcr {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn call(&self, input: &OcrInput) -> Result<String, ProviderError> {
        let content = GeminiContent::user_with_image(GEMINI_PROMPT, &input.mime_type, &input.image);
        self.client.generate(None, &[content]).await
    }
}

pub type OcrAdapter = Arc<dyn Adapter<OcrInput, String>>;

pub struct OcrProviders {
    huggingface: Vec<(OcrModel, OcrAdapter)>,
    fallback: OcrAdapter,
}

impl OcrProviders {
    pub fn new(huggingface: HuggingFaceClient, gemini: GeminiClient) -> Self {
        let models = [OcrModel::TrocrBase, OcrModel::TrocrLarge, OcrModel::Nougat];
        Self {
            huggingface: models
                .into_iter()
                .map(|m| {
                    let adapter: OcrAdapter = Arc::new(HuggingFaceOcr::new(huggingface.clone(), m));
                    (m, adapter)
                })
                .collect(),
            fallback: Arc::new(GeminiOcr::new(gemini)),
        }
    }

    pub fn from_adapters(huggingface: Vec<(OcrModel, OcrAdapter)>, fallback: OcrAdapter) -> Self {
        Self {
            huggingface,
            fallback,
        }
    }

    /// Selected model, then trocr-base and trocr-large (skipping duplicates), then Gemini.
    pub fn chain_for(&self, selected: OcrModel) -> Chain<OcrInput, String> {
        let mut order = vec![selected];
        for m in [OcrModel::TrocrBase, OcrModel::TrocrLarge] {
            if !order.contains(&m) {
                order.push(m);
            }
        }
        let mut chain = Chain::new("ocr");
        for model in order {
            if let Some((_, adapter)) = self.huggingface.iter().find(|(m, _)| *m == model) {
                chain = chain.with(adapter.clone());
            }
        }
        chain.with(self.fallback.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.chain_for(OcrModel::default()).is_configured()
    }
}

fn non_empty_text(text: String) -> Result<String, NormalizeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::Empty {
            capability: "ocr".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

pub async fn recognize(
    providers: &OcrProviders,
    request: OcrRequest,
) -> Result<ChainSuccess<OcrResult>, CapabilityError> {
    let input = request.validate()?;
    let success = providers
        .chain_for(input.model)
        .run(&input, non_empty_text)
        .await?;

    Ok(ChainSuccess {
        provider: success.provider,
        attempts: success.attempts,
        value: OcrResult {
            text: success.value,
            confidence: OCR_CONFIDENCE,
            language: OCR_LANGUAGE.to_string(),
        },
    })
}
