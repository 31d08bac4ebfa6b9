//! Per-session conversation memory for enhanced chat.
//!
//! Sessions live in an LRU-bounded [`SessionStore`]. Each session is wrapped
//! in its own async mutex, so two requests for the same session apply their
//! updates one after the other while different sessions proceed in parallel.
//!
//! Memory is a summary buffer: recent turns are kept verbatim and, once their
//! estimated size passes the token budget, the oldest turns are folded into a
//! rolling summary by a [`ConversationSummarizer`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::error::ProviderError;
use crate::models::{ChatMessage, Role};
use crate::provider::OpenRouterClient;

/// Rough token estimate used for the memory budget.
const CHARS_PER_TOKEN: usize = 4;

pub const OPENING_USER: &str = "System: Conversation started";
pub const OPENING_ASSISTANT: &str = "Hello! I'm ready to help you today.";

/// Longest summary the local summarizer keeps.
const LOCAL_SUMMARY_CHARS: usize = 2000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMemory {
    pub session_id: String,
    pub summary: Option<String>,
    pub turns: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationMemory {
    /// New memory seeded with the opening exchange.
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            summary: None,
            turns: vec![
                ChatMessage::new(Role::User, OPENING_USER),
                ChatMessage::new(Role::Assistant, OPENING_ASSISTANT),
            ],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn append_turn(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ChatMessage::new(role, content));
        self.updated_at = Utc::now();
    }

    pub fn estimated_tokens(&self) -> usize {
        let summary = self.summary.as_deref().map(str::len).unwrap_or(0);
        (summary + turn_chars(&self.turns)).div_ceil(CHARS_PER_TOKEN)
    }

    /// Summary (as a system message) followed by the verbatim turns.
    pub fn context_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if let Some(summary) = &self.summary {
            messages.push(ChatMessage::new(
                Role::System,
                format!("Summary of the conversation so far: {}", summary),
            ));
        }
        messages.extend(self.turns.iter().cloned());
        messages
    }
}

fn turn_chars(turns: &[ChatMessage]) -> usize {
    turns.iter().map(|t| t.content.len()).sum()
}

fn turn_tokens(turns: &[ChatMessage]) -> usize {
    turn_chars(turns).div_ceil(CHARS_PER_TOKEN)
}

/// Folds old turns into a rolling summary.
#[async_trait]
pub trait ConversationSummarizer: Send + Sync {
    async fn summarize(
        &self,
        previous: Option<&str>,
        turns: &[ChatMessage],
    ) -> Result<String, ProviderError>;
}

/// Offline summarizer: appends the folded turns as a transcript and keeps
/// the most recent part of it.
pub struct TruncatingSummarizer {
    max_chars: usize,
}

impl TruncatingSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    fn fold(&self, previous: Option<&str>, turns: &[ChatMessage]) -> String {
        let mut text = previous.unwrap_or_default().to_string();
        for turn in turns {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(turn.role.as_str());
            text.push_str(": ");
            text.push_str(&turn.content);
        }
        keep_tail(&text, self.max_chars).to_string()
    }
}

impl Default for TruncatingSummarizer {
    fn default() -> Self {
        Self::new(LOCAL_SUMMARY_CHARS)
    }
}

#[async_trait]
impl ConversationSummarizer for TruncatingSummarizer {
    async fn summarize(
        &self,
        previous: Option<&str>,
        turns: &[ChatMessage],
    ) -> Result<String, ProviderError> {
        Ok(self.fold(previous, turns))
    }
}

/// Last `max_chars` bytes of `text`, moved forward to a char boundary.
fn keep_tail(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut start = text.len() - max_chars;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Summarizer backed by an OpenRouter completion. Falls back to
/// [`TruncatingSummarizer`] when OpenRouter is unconfigured or fails.
pub struct LlmSummarizer {
    client: OpenRouterClient,
    model: String,
    local: TruncatingSummarizer,
}

impl LlmSummarizer {
    pub fn new(client: OpenRouterClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            local: TruncatingSummarizer::default(),
        }
    }
}

#[async_trait]
impl ConversationSummarizer for LlmSummarizer {
    async fn summarize(
        &self,
        previous: Option<&str>,
        turns: &[ChatMessage],
    ) -> Result<String, ProviderError> {
        if !self.client.is_configured() {
            return self.local.summarize(previous, turns).await;
        }

        let transcript = self.local.fold(None, turns);
        let prompt = format!(
            "Progressively summarize the lines of conversation provided, adding onto the \
             previous summary and returning a new summary.\n\n\
             Current summary:\n{}\n\nNew lines of conversation:\n{}\n\nNew summary:",
            previous.unwrap_or(""),
            transcript
        );

        match self
            .client
            .complete(&self.model, &[ChatMessage::new(Role::User, prompt)], Some(0.0))
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => Ok(summary.trim().to_string()),
            Ok(_) => self.local.summarize(previous, turns).await,
            Err(err) => {
                tracing::warn!(error = %err, "LLM summary failed; using local summary");
                self.local.summarize(previous, turns).await
            }
        }
    }
}

/// Fold the oldest turns into the summary while the verbatim turns exceed
/// `max_token_limit`. The latest turn is always kept. Returns whether
/// anything was folded; on summarizer failure the memory is left unchanged.
pub async fn summarize_if_over_budget(
    memory: &mut ConversationMemory,
    max_token_limit: usize,
    summarizer: &dyn ConversationSummarizer,
) -> Result<bool, ProviderError> {
    let mut keep_from = 0;
    while keep_from + 1 < memory.turns.len()
        && turn_tokens(&memory.turns[keep_from..]) > max_token_limit
    {
        keep_from += 1;
    }
    if keep_from == 0 {
        return Ok(false);
    }

    let summary = summarizer
        .summarize(memory.summary.as_deref(), &memory.turns[..keep_from])
        .await?;
    memory.turns.drain(..keep_from);
    memory.summary = Some(summary);
    memory.updated_at = Utc::now();
    tracing::debug!(
        session = %memory.session_id,
        folded = keep_from,
        remaining = memory.turns.len(),
        "conversation memory summarized"
    );
    Ok(true)
}

pub type SharedMemory = Arc<tokio::sync::Mutex<ConversationMemory>>;

/// LRU-bounded map from session id to conversation memory.
pub struct SessionStore {
    sessions: Mutex<LruCache<String, SharedMemory>>,
    max_token_limit: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize, max_token_limit: usize) -> Self {
        let capacity = NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            max_token_limit,
        }
    }

    pub fn max_token_limit(&self) -> usize {
        self.max_token_limit
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, SharedMemory>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Existing session (marked most recently used) or a freshly seeded one.
    pub fn get_or_create(&self, session_id: &str) -> SharedMemory {
        let mut sessions = self.lock();
        if let Some(memory) = sessions.get(session_id) {
            return memory.clone();
        }
        let memory = Arc::new(tokio::sync::Mutex::new(ConversationMemory::new(session_id)));
        if let Some((evicted, _)) = sessions.push(session_id.to_string(), memory.clone()) {
            tracing::info!(session = %evicted, "evicted least recently used session");
        }
        memory
    }

    pub fn get(&self, session_id: &str) -> Option<SharedMemory> {
        self.lock().get(session_id).cloned()
    }

    /// Copy of a session's memory for diagnostics.
    pub async fn snapshot(&self, session_id: &str) -> Option<ConversationMemory> {
        let memory = self.get(session_id)?;
        let guard = memory.lock().await;
        Some(guard.clone())
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.lock().pop(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
