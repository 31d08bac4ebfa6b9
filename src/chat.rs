//! Streaming chat with personas and optional session memory.
//!
//! Chain: OpenRouter streaming completion, then Gemini streaming. An adapter
//! fails over only while its stream is being established; once fragments
//! start flowing the reply belongs to that provider. When every provider
//! fails, the reply is a fixed apology streamed like any other answer.
//!
//! With a `sessionId`, the prompt is built from the session memory instead of
//! the client-supplied history, and the finished reply is written back to it.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::{Arc, Mutex};

use crate::error::{CapabilityError, ProviderError};
use crate::memory::{
    summarize_if_over_budget, ConversationMemory, ConversationSummarizer, SessionStore,
};
use crate::models::{ChatMessage, Persona, Role};
use crate::orchestrator::{Adapter, Chain};
use crate::provider::{GeminiClient, GeminiContent, OpenRouterClient, TextStream};

pub const APOLOGY: &str =
    "I'm having trouble connecting to the AI services right now. Please try again in a moment.";

const CHAT_TEMPERATURE: f64 = 0.7;

type SessionGuard = tokio::sync::OwnedMutexGuard<ConversationMemory>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Unknown persona tags fall back to the general assistant.
pub fn parse_persona(tag: Option<&str>) -> Persona {
    match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
        Some("developer") => Persona::Developer,
        Some("creative") => Persona::Creative,
        Some("analyst") => Persona::Analyst,
        _ => Persona::General,
    }
}

pub struct OpenRouterChat {
    client: OpenRouterClient,
    model: String,
    name: String,
}

impl OpenRouterChat {
    pub fn new(client: OpenRouterClient, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            name: format!("openrouter:{}", model),
            client,
            model,
        }
    }
}

#[async_trait]
impl Adapter<Vec<ChatMessage>, TextStream> for OpenRouterChat {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn call(&self, messages: &Vec<ChatMessage>) -> Result<TextStream, ProviderError> {
        self.client
            .stream(&self.model, messages, Some(CHAT_TEMPERATURE))
            .await
    }
}

pub struct GeminiChat {
    client: GeminiClient,
}

impl GeminiChat {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter<Vec<ChatMessage>, TextStream> for GeminiChat {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn call(&self, messages: &Vec<ChatMessage>) -> Result<TextStream, ProviderError> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let system = (!system.is_empty()).then(|| system.join("\n\n"));
        let contents: Vec<GeminiContent> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(GeminiContent::from_message)
            .collect();
        self.client.stream(system.as_deref(), &contents).await
    }
}

pub fn default_chain(
    openrouter: OpenRouterClient,
    model: impl Into<String>,
    gemini: GeminiClient,
) -> Chain<Vec<ChatMessage>, TextStream> {
    Chain::new("chat")
        .with(Arc::new(OpenRouterChat::new(openrouter, model)))
        .with(Arc::new(GeminiChat::new(gemini)))
}

/// A chat answer ready to be streamed to the client.
pub struct ChatReply {
    pub persona: Persona,
    /// Provider serving the reply; `None` for the apology.
    pub provider: Option<String>,
    /// Set when the primary provider did not serve the reply.
    pub fallback: Option<String>,
    pub stream: TextStream,
}

pub struct ChatService {
    chain: Chain<Vec<ChatMessage>, TextStream>,
    sessions: Arc<SessionStore>,
    summarizer: Arc<dyn ConversationSummarizer>,
}

impl ChatService {
    pub fn new(
        chain: Chain<Vec<ChatMessage>, TextStream>,
        sessions: Arc<SessionStore>,
        summarizer: Arc<dyn ConversationSummarizer>,
    ) -> Self {
        Self {
            chain,
            sessions,
            summarizer,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn is_configured(&self) -> bool {
        self.chain.is_configured()
    }

    pub async fn reply(&self, request: ChatRequest) -> Result<ChatReply, CapabilityError> {
        let current = match request.messages.last() {
            Some(m) if !m.content.trim().is_empty() => m.clone(),
            Some(_) => {
                return Err(CapabilityError::InvalidInput(
                    "The last message must not be empty".to_string(),
                ))
            }
            None => {
                return Err(CapabilityError::InvalidInput(
                    "Invalid messages format".to_string(),
                ))
            }
        };
        let persona = parse_persona(request.persona.as_deref());
        if !self.chain.is_configured() {
            return Err(CapabilityError::NotConfigured {
                capability: "chat".to_string(),
            });
        }

        // The session stays locked until the reply has been recorded, so
        // exchanges on one session run one at a time.
        let mut session = match request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            Some(id) => Some(self.sessions.get_or_create(id).lock_owned().await),
            None => None,
        };

        let mut prompt = vec![ChatMessage::new(Role::System, persona.system_prompt())];
        match session {
            Some(ref mut memory) => {
                memory.append_turn(Role::User, current.content.clone());
                prompt.extend(memory.context_messages());
            }
            None => prompt.extend(request.messages.iter().cloned()),
        }

        match self.chain.run_stream(&prompt).await {
            Ok(success) => {
                let fallback = (success.attempts.len() > 1).then(|| success.provider.clone());
                let stream = match session {
                    Some(memory) => self.recording(success.value, memory),
                    None => success.value,
                };
                Ok(ChatReply {
                    persona,
                    provider: Some(success.provider),
                    fallback,
                    stream,
                })
            }
            Err(CapabilityError::AllProvidersFailed { attempts, .. }) => {
                tracing::error!(attempts = attempts.len(), "all chat providers failed; sending apology");
                Ok(ChatReply {
                    persona,
                    provider: None,
                    fallback: Some("error".to_string()),
                    stream: stream::once(async { Ok(APOLOGY.to_string()) }).boxed(),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Pass fragments through and append the full reply to the session
    /// memory once the stream has been consumed to the end. Dropping the
    /// stream early releases the session without recording a reply.
    fn recording(&self, inner: TextStream, memory: SessionGuard) -> TextStream {
        let collected = Arc::new(Mutex::new(String::new()));
        let sink = collected.clone();
        let summarizer = self.summarizer.clone();
        let limit = self.sessions.max_token_limit();

        let passthrough = inner.inspect(move |item| {
            if let Ok(fragment) = item {
                sink.lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push_str(fragment);
            }
        });

        let finish = stream::once(async move {
            let reply = std::mem::take(&mut *collected.lock().unwrap_or_else(|p| p.into_inner()));
            record_reply(memory, reply, limit, summarizer.as_ref()).await;
            None
        })
        .filter_map(|item: Option<Result<String, ProviderError>>| async move { item });

        passthrough.chain(finish).boxed()
    }
}

async fn record_reply(
    mut memory: SessionGuard,
    reply: String,
    limit: usize,
    summarizer: &dyn ConversationSummarizer,
) {
    if reply.trim().is_empty() {
        return;
    }
    memory.append_turn(Role::Assistant, reply);
    if let Err(err) = summarize_if_over_budget(&mut memory, limit, summarizer).await {
        tracing::warn!(session = %memory.session_id, error = %err, "memory summary failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::TruncatingSummarizer;
    use crate::orchestrator::testing::MockAdapter;

    fn fragments(parts: &[&str]) -> TextStream {
        let items: Vec<Result<String, ProviderError>> =
            parts.iter().map(|p| Ok(p.to_string())).collect();
        stream::iter(items).boxed()
    }

    fn service(adapters: Vec<Arc<MockAdapter<TextStream>>>) -> ChatService {
        let mut chain: Chain<Vec<ChatMessage>, TextStream> = Chain::new("chat");
        for a in adapters {
            chain = chain.with(a);
        }
        ChatService::new(
            chain,
            Arc::new(SessionStore::new(10, 2000)),
            Arc::new(TruncatingSummarizer::default()),
        )
    }

    fn user(text: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::new(Role::User, text)],
            persona: None,
            session_id: None,
        }
    }

    async fn collect(stream: TextStream) -> String {
        stream
            .map(|r| r.unwrap())
            .collect::<Vec<String>>()
            .await
            .concat()
    }

    /// Replies with the number of non-system messages it was prompted with.
    struct CountingAdapter;

    #[async_trait]
    impl Adapter<Vec<ChatMessage>, TextStream> for CountingAdapter {
        fn name(&self) -> &str {
            "counting"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn call(&self, messages: &Vec<ChatMessage>) -> Result<TextStream, ProviderError> {
            let seen = messages.iter().filter(|m| m.role != Role::System).count();
            let reply = format!("saw {}", seen);
            Ok(fragments(&[reply.as_str()]))
        }
    }

    fn in_session(text: &str) -> ChatRequest {
        ChatRequest {
            session_id: Some("shared".to_string()),
            ..user(text)
        }
    }

    #[test]
    fn test_persona_parsing() {
        assert_eq!(parse_persona(Some("Developer")), Persona::Developer);
        assert_eq!(parse_persona(Some("pirate")), Persona::General);
        assert_eq!(parse_persona(None), Persona::General);
    }

    #[tokio::test]
    async fn test_streams_primary_provider() {
        let primary = Arc::new(MockAdapter::ok("openrouter", fragments(&["Hel", "lo"])));
        let chat = service(vec![primary.clone()]);

        let reply = chat.reply(user("hi")).await.unwrap();
        assert_eq!(reply.provider.as_deref(), Some("openrouter"));
        assert!(reply.fallback.is_none());
        assert_eq!(collect(reply.stream).await, "Hello");
    }

    #[tokio::test]
    async fn test_falls_back_when_stream_cannot_start() {
        let primary = Arc::new(MockAdapter::<TextStream>::failing("openrouter"));
        let backup = Arc::new(MockAdapter::ok("gemini", fragments(&["Hi"])));
        let chat = service(vec![primary, backup]);

        let reply = chat.reply(user("hi")).await.unwrap();
        assert_eq!(reply.fallback.as_deref(), Some("gemini"));
        assert_eq!(collect(reply.stream).await, "Hi");
    }

    #[tokio::test]
    async fn test_all_failed_streams_apology() {
        let chat = service(vec![
            Arc::new(MockAdapter::<TextStream>::failing("openrouter")),
            Arc::new(MockAdapter::<TextStream>::failing("gemini")),
        ]);
        let reply = chat.reply(user("hi")).await.unwrap();
        assert!(reply.provider.is_none());
        assert_eq!(reply.fallback.as_deref(), Some("error"));
        assert_eq!(collect(reply.stream).await, APOLOGY);
    }

    #[tokio::test]
    async fn test_not_configured_is_an_error() {
        let chat = service(vec![Arc::new(MockAdapter::<TextStream>::unconfigured("openrouter"))]);
        let err = chat.reply(user("hi")).await.err().unwrap();
        assert!(matches!(err, CapabilityError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_invalid_messages() {
        let chat = service(vec![Arc::new(MockAdapter::ok("openrouter", fragments(&["x"])))]);
        let empty = ChatRequest {
            messages: Vec::new(),
            persona: None,
            session_id: None,
        };
        assert!(matches!(
            chat.reply(empty).await.err().unwrap(),
            CapabilityError::InvalidInput(_)
        ));
        assert!(matches!(
            chat.reply(user("  ")).await.err().unwrap(),
            CapabilityError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn test_session_records_both_turns() {
        let chat = service(vec![Arc::new(MockAdapter::ok(
            "openrouter",
            fragments(&["Ownership ", "moves values."]),
        ))]);
        let request = ChatRequest {
            session_id: Some("s-1".to_string()),
            persona: Some("developer".to_string()),
            ..user("What is a move?")
        };

        let reply = chat.reply(request).await.unwrap();
        assert_eq!(reply.persona, Persona::Developer);
        assert_eq!(collect(reply.stream).await, "Ownership moves values.");

        let memory = chat.sessions().snapshot("s-1").await.unwrap();
        let n = memory.turns.len();
        assert_eq!(memory.turns[n - 2].content, "What is a move?");
        assert_eq!(memory.turns[n - 1].content, "Ownership moves values.");
        assert_eq!(memory.turns[n - 1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_session_exchanges_do_not_interleave() {
        let chain: Chain<Vec<ChatMessage>, TextStream> =
            Chain::new("chat").with(Arc::new(CountingAdapter));
        let chat = ChatService::new(
            chain,
            Arc::new(SessionStore::new(10, 2000)),
            Arc::new(TruncatingSummarizer::default()),
        );

        let first = chat.reply(in_session("Q1")).await.unwrap();
        let second = chat.reply(in_session("Q2"));
        tokio::pin!(second);
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), &mut second).await;
        assert!(waited.is_err(), "second exchange started before the first finished");

        assert_eq!(collect(first.stream).await, "saw 3");
        let second = second.await.unwrap();
        assert_eq!(collect(second.stream).await, "saw 5");

        let memory = chat.sessions().snapshot("shared").await.unwrap();
        let contents: Vec<&str> = memory.turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(&contents[contents.len() - 4..], &["Q1", "saw 3", "Q2", "saw 5"]);
    }
}
