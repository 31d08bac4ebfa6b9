//! Abstractive summarization.
//!
//! Chain order depends on the requested model: the selected Hugging Face
//! model, then `bart-cnn` and `t5-small` unless already tried, then Gemini.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{CapabilityError, ProviderError};
use crate::models::{SummarizationResult, SummaryModel};
use crate::normalize::extract_summary_text;
use crate::orchestrator::{Adapter, Chain, ChainSuccess};
use crate::provider::{GeminiClient, HuggingFaceClient};

pub const MIN_CHARS: usize = 50;
pub const MAX_CHARS: usize = 10_000;

const DEFAULT_SUMMARY_TYPE: &str = "concise";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub summary_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SummarizeInput {
    pub text: String,
    pub model: SummaryModel,
    pub summary_type: String,
}

impl SummarizeRequest {
    pub fn validate(self) -> Result<SummarizeInput, CapabilityError> {
        let chars = self.text.chars().count();
        if self.text.trim().is_empty() {
            return Err(CapabilityError::InvalidInput(
                "Text is required and must be a string".to_string(),
            ));
        }
        if chars < MIN_CHARS {
            return Err(CapabilityError::InvalidInput(format!(
                "Text must be at least {} characters long",
                MIN_CHARS
            )));
        }
        if chars > MAX_CHARS {
            return Err(CapabilityError::InvalidInput(
                "Text is too long. Maximum 10,000 characters allowed.".to_string(),
            ));
        }

        let model = match self.model.as_deref() {
            None | Some("") => SummaryModel::default(),
            Some(key) => SummaryModel::from_key(key).unwrap_or_else(|| {
                tracing::warn!(model = key, "unknown summarization model; using the default");
                SummaryModel::default()
            }),
        };
        let summary_type = self
            .summary_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUMMARY_TYPE.to_string());

        Ok(SummarizeInput {
            text: self.text,
            model,
            summary_type,
        })
    }
}

/// Generation parameters scaled to the input length.
fn generation_parameters(text: &str) -> Value {
    let len = text.chars().count();
    json!({
        "max_length": (len * 2 / 5).min(150),
        "min_length": (len / 10).min(30),
        "do_sample": false,
        "early_stopping": true,
        "num_beams": 4,
        "length_penalty": 2.0,
        "no_repeat_ngram_size": 3,
    })
}

pub struct HuggingFaceSummarizer {
    client: HuggingFaceClient,
    model: SummaryModel,
    name: String,
}

impl HuggingFaceSummarizer {
    pub fn new(client: HuggingFaceClient, model: SummaryModel) -> Self {
        Self {
            client,
            model,
            name: format!("huggingface:{}", model.key()),
        }
    }
}

#[async_trait]
impl Adapter<SummarizeInput, Value> for HuggingFaceSummarizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn call(&self, input: &SummarizeInput) -> Result<Value, ProviderError> {
        let model = self.model.huggingface_model();
        self.client.wait_until_loaded(model).await?;
        let payload = json!({
            "inputs": input.text,
            "parameters": generation_parameters(&input.text),
        });
        self.client.infer_json(model, &payload).await
    }
}

pub struct GeminiSummarizer {
    client: GeminiClient,
}

impl GeminiSummarizer {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter<SummarizeInput, Value> for GeminiSummarizer {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn call(&self, input: &SummarizeInput) -> Result<Value, ProviderError> {
        let prompt = format!(
            "Please provide a {} summary of the following text. The summary should be \
             concise, informative, and capture the main points:\n\n\
             Text to summarize:\n{}\n\nSummary:",
            input.summary_type, input.text
        );
        Ok(Value::String(self.client.generate_text(&prompt).await?))
    }
}

pub type SummaryAdapter = Arc<dyn Adapter<SummarizeInput, Value>>;

/// Adapters available for summarization; the chain is assembled per request.
pub struct SummarizeProviders {
    huggingface: Vec<(SummaryModel, SummaryAdapter)>,
    fallback: SummaryAdapter,
}

impl SummarizeProviders {
    pub fn new(huggingface: HuggingFaceClient, gemini: GeminiClient) -> Self {
        let models = [SummaryModel::BartCnn, SummaryModel::T5Small, SummaryModel::Pegasus];
        Self {
            huggingface: models
                .into_iter()
                .map(|m| {
                    let adapter: SummaryAdapter =
                        Arc::new(HuggingFaceSummarizer::new(huggingface.clone(), m));
                    (m, adapter)
                })
                .collect(),
            fallback: Arc::new(GeminiSummarizer::new(gemini)),
        }
    }

    pub fn from_adapters(
        huggingface: Vec<(SummaryModel, SummaryAdapter)>,
        fallback: SummaryAdapter,
    ) -> Self {
        Self {
            huggingface,
            fallback,
        }
    }

    fn adapter(&self, model: SummaryModel) -> Option<SummaryAdapter> {
        self.huggingface
            .iter()
            .find(|(m, _)| *m == model)
            .map(|(_, a)| a.clone())
    }

    /// Selected model, then bart-cnn and t5-small (skipping duplicates), then Gemini.
    pub fn chain_for(&self, selected: SummaryModel) -> Chain<SummarizeInput, Value> {
        let mut order = vec![selected];
        for m in [SummaryModel::BartCnn, SummaryModel::T5Small] {
            if !order.contains(&m) {
                order.push(m);
            }
        }
        let chain = order
            .into_iter()
            .filter_map(|m| self.adapter(m))
            .fold(Chain::new("summarization"), |chain, a| chain.with(a));
        chain.with(self.fallback.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.chain_for(SummaryModel::default()).is_configured()
    }
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn compression_ratio(original: &str, summary: &str) -> i64 {
    let original_words = count_words(original);
    if original_words == 0 {
        return 0;
    }
    let ratio = 1.0 - count_words(summary) as f64 / original_words as f64;
    (ratio * 100.0).round() as i64
}

pub async fn summarize(
    providers: &SummarizeProviders,
    request: SummarizeRequest,
) -> Result<ChainSuccess<SummarizationResult>, CapabilityError> {
    let input = request.validate()?;
    let chain = providers.chain_for(input.model);
    let success = chain
        .run(&input, |raw| extract_summary_text(&raw))
        .await?;

    let summary = success.value.trim().to_string();
    Ok(ChainSuccess {
        provider: success.provider,
        attempts: success.attempts,
        value: SummarizationResult {
            word_count: count_words(&summary),
            compression_ratio: compression_ratio(&input.text, &summary),
            original_text: input.text,
            summary,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testing::MockAdapter;

    fn request(text: &str, model: Option<&str>) -> SummarizeRequest {
        SummarizeRequest {
            text: text.to_string(),
            model: model.map(String::from),
            summary_type: None,
        }
    }

    #[test]
    fn test_length_bounds() {
        assert!(request(&"a".repeat(49), None).validate().is_err());
        assert!(request(&"a".repeat(50), None).validate().is_ok());
        assert!(request(&"a".repeat(10_000), None).validate().is_ok());
        let err = request(&"a".repeat(10_001), None).validate().unwrap_err();
        assert!(err.to_string().contains("Maximum 10,000"));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        assert!(request(&"é".repeat(50), None).validate().is_ok());
        assert!(request(&"é".repeat(10_000), None).validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let input = request(&"a".repeat(60), None).validate().unwrap();
        assert_eq!(input.model, SummaryModel::BartCnn);
        assert_eq!(input.summary_type, "concise");
        let unknown = request(&"a".repeat(60), Some("gpt")).validate().unwrap();
        assert_eq!(unknown.model, SummaryModel::BartCnn);
    }

    #[test]
    fn test_generation_parameters_scale_with_length() {
        let short = generation_parameters(&"a".repeat(100));
        assert_eq!(short["max_length"], 40);
        assert_eq!(short["min_length"], 10);
        let long = generation_parameters(&"a".repeat(5000));
        assert_eq!(long["max_length"], 150);
        assert_eq!(long["min_length"], 30);
        assert_eq!(long["num_beams"], 4);
    }

    #[test]
    fn test_compression_ratio() {
        let original = "one two three four five six seven eight nine ten";
        assert_eq!(compression_ratio(original, "one two"), 80);
        assert_eq!(compression_ratio(original, original), 0);
    }

    fn providers(
        bart: MockAdapter<Value>,
        t5: MockAdapter<Value>,
        pegasus: MockAdapter<Value>,
        gemini: MockAdapter<Value>,
    ) -> (SummarizeProviders, Vec<Arc<MockAdapter<Value>>>) {
        let mocks: Vec<Arc<MockAdapter<Value>>> =
            vec![Arc::new(bart), Arc::new(t5), Arc::new(pegasus), Arc::new(gemini)];
        let providers = SummarizeProviders::from_adapters(
            vec![
                (SummaryModel::BartCnn, mocks[0].clone() as SummaryAdapter),
                (SummaryModel::T5Small, mocks[1].clone() as SummaryAdapter),
                (SummaryModel::Pegasus, mocks[2].clone() as SummaryAdapter),
            ],
            mocks[3].clone(),
        );
        (providers, mocks)
    }

    #[test]
    fn test_chain_order_skips_duplicates() {
        let (p, _) = providers(
            MockAdapter::failing("huggingface:bart-cnn"),
            MockAdapter::failing("huggingface:t5-small"),
            MockAdapter::failing("huggingface:pegasus"),
            MockAdapter::failing("gemini"),
        );
        assert_eq!(
            p.chain_for(SummaryModel::Pegasus).provider_names(),
            vec!["huggingface:pegasus", "huggingface:bart-cnn", "huggingface:t5-small", "gemini"]
        );
        assert_eq!(
            p.chain_for(SummaryModel::T5Small).provider_names(),
            vec!["huggingface:t5-small", "huggingface:bart-cnn", "gemini"]
        );
        assert_eq!(
            p.chain_for(SummaryModel::BartCnn).provider_names(),
            vec!["huggingface:bart-cnn", "huggingface:t5-small", "gemini"]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_gemini() {
        let (p, mocks) = providers(
            MockAdapter::failing("huggingface:bart-cnn"),
            MockAdapter::ok("huggingface:t5-small", json!({ "error": "weird" })),
            MockAdapter::failing("huggingface:pegasus"),
            MockAdapter::ok("gemini", Value::String("  A short summary.  ".to_string())),
        );
        let text = "Rust is a systems programming language focused on safety and speed. \
                    It prevents data races at compile time.";

        let success = summarize(&p, request(text, None)).await.unwrap();
        assert_eq!(success.provider, "gemini");
        assert_eq!(success.value.summary, "A short summary.");
        assert_eq!(success.value.word_count, 3);
        assert_eq!(mocks[2].calls(), 0);
        assert_eq!(success.attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_out_of_range_makes_no_calls() {
        let (p, mocks) = providers(
            MockAdapter::ok("huggingface:bart-cnn", json!([{ "summary_text": "x" }])),
            MockAdapter::failing("huggingface:t5-small"),
            MockAdapter::failing("huggingface:pegasus"),
            MockAdapter::failing("gemini"),
        );
        let err = summarize(&p, request("too short", None)).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidInput(_)));
        assert!(mocks.iter().all(|m| m.calls() == 0));
    }
}
