//! Question answering over an optional user-supplied context.
//!
//! Q&A has a single provider (an OpenRouter completion) and no fallback: a
//! missing key is a configuration error and any provider failure is reported
//! as an upstream error.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{CapabilityError, ProviderError};
use crate::models::{ChatMessage, QnaResult, Role};
use crate::orchestrator::Adapter;
use crate::provider::OpenRouterClient;

/// Confidence reported for generated answers; the provider gives none.
pub const ANSWER_CONFIDENCE: u8 = 95;

pub const ANSWER_TEMPERATURE: f64 = 0.2;

const SYSTEM_PROMPT: &str = "You are a highly knowledgeable Q&A assistant. Give accurate, \
concise and well-structured answers. If you don't know the answer, say so.\n\n\
1. Work out what the user is actually asking.\n\
2. Start with a direct answer.\n\
3. Add supporting details, examples or explanations where useful.\n\
4. Use lists and bold text to make the answer easy to scan.\n\
5. Leave out irrelevant information.\n\
6. Stay polite and professional.";

/// Buffered chat completion behind the [`Adapter`] seam.
pub type CompletionAdapter = dyn Adapter<Vec<ChatMessage>, String>;

pub struct OpenRouterCompletion {
    client: OpenRouterClient,
    model: String,
    temperature: f64,
    name: String,
}

impl OpenRouterCompletion {
    pub fn new(client: OpenRouterClient, model: impl Into<String>, temperature: f64) -> Self {
        let model = model.into();
        Self {
            name: format!("openrouter:{}", model),
            client,
            model,
            temperature,
        }
    }
}

#[async_trait]
impl Adapter<Vec<ChatMessage>, String> for OpenRouterCompletion {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn call(&self, messages: &Vec<ChatMessage>) -> Result<String, ProviderError> {
        self.client
            .complete(&self.model, messages, Some(self.temperature))
            .await
    }
}

/// One call to a single completion provider.
pub async fn complete_once(
    adapter: &CompletionAdapter,
    capability: &str,
    messages: Vec<ChatMessage>,
) -> Result<String, CapabilityError> {
    if !adapter.is_configured() {
        return Err(CapabilityError::NotConfigured {
            capability: capability.to_string(),
        });
    }
    adapter.call(&messages).await.map_err(|err| {
        tracing::warn!(capability, provider = adapter.name(), error = %err, "completion failed");
        CapabilityError::Upstream(format!("{} provider error: {}", capability, err))
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct QnaRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub context: String,
}

pub async fn answer(
    completion: &CompletionAdapter,
    request: QnaRequest,
) -> Result<QnaResult, CapabilityError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(CapabilityError::InvalidInput("Question is required".to_string()));
    }

    let messages = vec![
        ChatMessage::new(Role::System, SYSTEM_PROMPT),
        ChatMessage::new(
            Role::User,
            format!(
                "Question: {}\n\nContext (if any):\n{}",
                question, request.context
            ),
        ),
    ];
    let answer = complete_once(completion, "qna", messages).await?;

    Ok(QnaResult {
        question: question.to_string(),
        answer: answer.trim().to_string(),
        context: request.context,
        confidence: ANSWER_CONFIDENCE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testing::MockAdapter;

    fn request(question: &str, context: &str) -> QnaRequest {
        QnaRequest {
            question: question.to_string(),
            context: context.to_string(),
        }
    }

    #[tokio::test]
    async fn test_answer_echoes_context() {
        let llm = MockAdapter::ok("openrouter", "  Paris.  ".to_string());
        let result = answer(&llm, request("Capital of France?", "Geography notes"))
            .await
            .unwrap();
        assert_eq!(result.answer, "Paris.");
        assert_eq!(result.context, "Geography notes");
        assert_eq!(result.confidence, 95);
    }

    #[tokio::test]
    async fn test_blank_question_rejected_without_call() {
        let llm = MockAdapter::ok("openrouter", "x".to_string());
        let err = answer(&llm, request("   ", "")).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidInput(_)));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_is_not_configured() {
        let llm = MockAdapter::<String>::unconfigured("openrouter");
        let err = answer(&llm, request("Why?", "")).await.unwrap_err();
        assert!(matches!(err, CapabilityError::NotConfigured { .. }));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_upstream_error() {
        let llm = MockAdapter::<String>::failing("openrouter");
        let err = answer(&llm, request("Why?", "")).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Upstream(_)));
        assert!(err.to_string().contains("openrouter exploded"));
    }
}
