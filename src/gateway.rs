//! Wiring of every capability into one shared [`Gateway`].
//!
//! [`Gateway::from_config`] builds the provider clients from the config and
//! the environment credentials. Tests assemble a gateway from their own
//! adapters through the public fields.

use serde_json::Value;
use std::sync::Arc;

use crate::chat::{self, ChatService};
use crate::classify::{self, ClassifyInput};
use crate::config::{Config, CredentialStatus, Credentials};
use crate::embedding::HashEmbedder;
use crate::memory::{ConversationSummarizer, LlmSummarizer, SessionStore};
use crate::ocr::OcrProviders;
use crate::orchestrator::Chain;
use crate::provider::{http_client, GeminiClient, HuggingFaceClient, OpenRouterClient};
use crate::qna::{CompletionAdapter, OpenRouterCompletion, ANSWER_TEMPERATURE};
use crate::rag::RagService;
use crate::summarize::SummarizeProviders;

pub struct Gateway {
    pub classify: Chain<ClassifyInput, Value>,
    pub summarize: SummarizeProviders,
    pub ocr: OcrProviders,
    pub chat: ChatService,
    pub qna: Arc<CompletionAdapter>,
    pub rag: RagService,
    pub credentials: Vec<CredentialStatus>,
}

impl Gateway {
    pub fn from_config(config: &Config, credentials: &Credentials) -> anyhow::Result<Self> {
        let http = http_client(&config.providers)?;
        let providers = &config.providers;

        let huggingface =
            HuggingFaceClient::new(http.clone(), providers, credentials.huggingface.clone());
        let gemini = GeminiClient::new(http.clone(), providers, credentials.gemini.clone());
        let openrouter = OpenRouterClient::new(http, providers, credentials.openrouter.clone());

        let completion: Arc<CompletionAdapter> = Arc::new(OpenRouterCompletion::new(
            openrouter.clone(),
            providers.openrouter_answer_model.clone(),
            ANSWER_TEMPERATURE,
        ));
        let summarizer: Arc<dyn ConversationSummarizer> = Arc::new(LlmSummarizer::new(
            openrouter.clone(),
            providers.openrouter_answer_model.clone(),
        ));
        let sessions = Arc::new(SessionStore::new(
            config.memory.max_sessions,
            config.memory.max_token_limit,
        ));

        Ok(Self {
            classify: classify::default_chain(huggingface.clone(), gemini.clone()),
            summarize: SummarizeProviders::new(huggingface.clone(), gemini.clone()),
            ocr: OcrProviders::new(huggingface, gemini.clone()),
            chat: ChatService::new(
                chat::default_chain(openrouter, providers.openrouter_chat_model.clone(), gemini),
                sessions,
                summarizer,
            ),
            rag: RagService::new(
                &config.rag,
                Arc::new(HashEmbedder::new(config.rag.embedding_dims)),
                completion.clone(),
            ),
            qna: completion,
            credentials: credentials.status(),
        })
    }

    /// Capability name and whether at least one of its providers is configured.
    pub fn capability_status(&self) -> Vec<(&'static str, bool)> {
        let answers = self.qna.is_configured();
        vec![
            ("chat", self.chat.is_configured()),
            ("summarize", self.summarize.is_configured()),
            ("classify", self.classify.is_configured()),
            ("ocr", self.ocr.is_configured()),
            ("qna", answers),
            ("rag", answers),
        ]
    }
}
