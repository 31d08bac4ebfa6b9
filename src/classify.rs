//! Text classification: sentiment, topic and emotion.
//!
//! Chain: Hugging Face task model, then Gemini asked for a JSON answer.
//! Every raw payload goes through [`normalize_or_degrade`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{CapabilityError, ProviderError};
use crate::models::{ClassificationResult, ClassificationTask};
use crate::normalize::{normalize_or_degrade, strip_code_fences};
use crate::orchestrator::{Adapter, Chain, ChainSuccess};
use crate::provider::{GeminiClient, HuggingFaceClient};

pub const DEFAULT_TOPIC_LABELS: &[&str] = &["business", "politics", "sports"];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub custom_labels: Option<Vec<String>>,
}

/// Validated classification input.
#[derive(Debug, Clone)]
pub struct ClassifyInput {
    pub text: String,
    pub task: ClassificationTask,
    /// Candidate labels; only used for topic classification.
    pub labels: Vec<String>,
}

impl ClassifyRequest {
    pub fn validate(self) -> Result<ClassifyInput, CapabilityError> {
        if self.text.trim().is_empty() {
            return Err(CapabilityError::InvalidInput("Text is required".to_string()));
        }
        let tag = self
            .model
            .ok_or_else(|| CapabilityError::InvalidInput("Model is required".to_string()))?;
        let task = ClassificationTask::from_tag(&tag).ok_or_else(|| {
            CapabilityError::InvalidInput(format!("Unknown classification model: {}", tag))
        })?;

        let labels: Vec<String> = self
            .custom_labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        let labels = if labels.is_empty() {
            DEFAULT_TOPIC_LABELS.iter().map(|l| l.to_string()).collect()
        } else {
            labels
        };

        Ok(ClassifyInput {
            text: self.text,
            task,
            labels,
        })
    }
}

pub struct HuggingFaceClassifier {
    client: HuggingFaceClient,
}

impl HuggingFaceClassifier {
    pub fn new(client: HuggingFaceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter<ClassifyInput, Value> for HuggingFaceClassifier {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn call(&self, input: &ClassifyInput) -> Result<Value, ProviderError> {
        let mut payload = json!({ "inputs": input.text });
        if input.task == ClassificationTask::Topic {
            payload["parameters"] = json!({ "candidate_labels": input.labels });
        }
        self.client
            .infer_json(input.task.huggingface_model(), &payload)
            .await
    }
}

pub struct GeminiClassifier {
    client: GeminiClient,
}

impl GeminiClassifier {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

fn gemini_prompt(input: &ClassifyInput) -> String {
    let instruction = match input.task {
        ClassificationTask::Sentiment => "Classify the sentiment as positive, negative, or neutral. \
             Provide the result in JSON format: {\"label\": \"sentiment\", \"score\": 0.99}"
            .to_string(),
        ClassificationTask::Topic => format!(
            "Classify the text into one of these categories: {}. \
             Provide the result in JSON format: {{\"labels\": [\"...\"], \"scores\": [...]}}",
            input.labels.join(", ")
        ),
        ClassificationTask::Emotion => "Detect the primary emotion. \
             Provide the result in JSON format: {\"label\": \"emotion\", \"score\": 0.99}"
            .to_string(),
    };
    format!("Analyze the following text: \"{}\".\n\n{}", input.text, instruction)
}

#[async_trait]
impl Adapter<ClassifyInput, Value> for GeminiClassifier {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn call(&self, input: &ClassifyInput) -> Result<Value, ProviderError> {
        let reply = self.client.generate_text(&gemini_prompt(input)).await?;
        Ok(serde_json::from_str(strip_code_fences(&reply))?)
    }
}

pub fn default_chain(huggingface: HuggingFaceClient, gemini: GeminiClient) -> Chain<ClassifyInput, Value> {
    Chain::new("classification")
        .with(Arc::new(HuggingFaceClassifier::new(huggingface)))
        .with(Arc::new(GeminiClassifier::new(gemini)))
}

pub async fn classify(
    chain: &Chain<ClassifyInput, Value>,
    request: ClassifyRequest,
) -> Result<ChainSuccess<ClassificationResult>, CapabilityError> {
    let input = request.validate()?;
    let task = input.task;
    chain
        .run(&input, move |raw| normalize_or_degrade(task, &raw))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testing::MockAdapter;

    fn request(text: &str, model: Option<&str>) -> ClassifyRequest {
        ClassifyRequest {
            text: text.to_string(),
            model: model.map(String::from),
            custom_labels: None,
        }
    }

    #[test]
    fn test_validation() {
        assert!(request("", Some("sentiment-analysis")).validate().is_err());
        assert!(request("hello", None).validate().is_err());
        assert!(request("hello", Some("spam-detection")).validate().is_err());

        let input = request("hello", Some("topic-classification")).validate().unwrap();
        assert_eq!(input.labels, vec!["business", "politics", "sports"]);

        let custom = ClassifyRequest {
            custom_labels: Some(vec![" tech ".to_string(), "".to_string(), "art".to_string()]),
            ..request("hello", Some("topic-classification"))
        };
        assert_eq!(custom.validate().unwrap().labels, vec!["tech", "art"]);
    }

    #[test]
    fn test_gemini_prompt_lists_topic_labels() {
        let input = request("Stocks rallied", Some("topic-classification"))
            .validate()
            .unwrap();
        let prompt = gemini_prompt(&input);
        assert!(prompt.contains("business, politics, sports"));
        assert!(prompt.contains("\"labels\""));
    }

    #[tokio::test]
    async fn test_emotion_label_mapping_through_chain() {
        let hf = Arc::new(MockAdapter::ok(
            "huggingface",
            json!([[{ "label": "LABEL_2", "score": 0.91 }, { "label": "LABEL_17", "score": 0.05 }]]),
        ));
        let gemini = Arc::new(MockAdapter::ok("gemini", json!({})));
        let chain: Chain<ClassifyInput, Value> =
            Chain::new("classification").with(hf.clone()).with(gemini.clone());

        let success = classify(&chain, request("I am furious", Some("emotion-detection")))
            .await
            .unwrap();
        assert_eq!(success.value.label, "anger");
        assert_eq!(success.value.confidence, 91);
        assert_eq!(success.value.categories[1].name, "joy");
        assert_eq!(gemini.calls(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_payload_falls_over_to_gemini() {
        let hf = Arc::new(MockAdapter::ok("huggingface", json!("garbage")));
        let gemini = Arc::new(MockAdapter::ok(
            "gemini",
            json!({ "label": "positive", "score": 0.97 }),
        ));
        let chain: Chain<ClassifyInput, Value> =
            Chain::new("classification").with(hf.clone()).with(gemini.clone());

        let success = classify(&chain, request("Great day", Some("sentiment-analysis")))
            .await
            .unwrap();
        assert_eq!(success.provider, "gemini");
        assert_eq!(success.value.label, "positive");
        assert_eq!(success.value.confidence, 97);
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_calls() {
        let hf = Arc::new(MockAdapter::ok("huggingface", json!([])));
        let chain: Chain<ClassifyInput, Value> = Chain::new("classification").with(hf.clone());
        let err = classify(&chain, request("   ", Some("sentiment-analysis")))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidInput(_)));
        assert_eq!(hf.calls(), 0);
    }
}
