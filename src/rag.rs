//! Retrieval-augmented question answering over uploaded documents.
//!
//! Upload: extract text, split into overlapping chunks, embed, append to the
//! in-memory [`DocumentStore`]. Query: embed the question, take the top-k
//! chunks by cosine similarity and ask the completion provider to answer
//! from that context only.
//!
//! The store publishes immutable snapshots (`Arc<Vec<DocumentChunk>>`).
//! Writers build a new vector and swap it in; readers clone the `Arc` and
//! rank without holding the lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::chunk::TextSplitter;
use crate::config::RagConfig;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::CapabilityError;
use crate::extract::{extract_text, resolve_content_type};
use crate::models::{ChatMessage, RagQueryResult, RagStatus, RagUploadResult, Role};
use crate::qna::{complete_once, CompletionAdapter};

pub const NOT_ENOUGH_INFORMATION: &str =
    "I don't have enough information in the provided documents to answer this question.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub id: Uuid,
    pub source: String,
    pub index: usize,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Default)]
struct Snapshot {
    chunks: Arc<Vec<DocumentChunk>>,
    documents: usize,
}

/// Process-wide, shared document index.
#[derive(Default)]
pub struct DocumentStore {
    inner: RwLock<Snapshot>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the chunks of one uploaded document. Returns the new document count.
    pub fn add(&self, chunks: Vec<DocumentChunk>) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        let mut next = Vec::with_capacity(inner.chunks.len() + chunks.len());
        next.extend(inner.chunks.iter().cloned());
        next.extend(chunks);
        inner.chunks = Arc::new(next);
        inner.documents += 1;
        inner.documents
    }

    pub fn snapshot(&self) -> Arc<Vec<DocumentChunk>> {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .chunks
            .clone()
    }

    /// Up to `k` chunks by descending similarity; ties keep insertion order.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<DocumentChunk> {
        let chunks = self.snapshot();
        let mut scored: Vec<(f32, &DocumentChunk)> = chunks
            .iter()
            .map(|c| (cosine_similarity(query, &c.embedding), c))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(_, c)| c.clone()).collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        *inner = Snapshot::default();
    }

    pub fn document_count(&self) -> usize {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).documents
    }

    pub fn chunk_count(&self) -> usize {
        self.snapshot().len()
    }
}

/// Uploaded file as received from the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct RagService {
    store: DocumentStore,
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    completion: Arc<CompletionAdapter>,
    top_k: usize,
}

impl RagService {
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn Embedder>,
        completion: Arc<CompletionAdapter>,
    ) -> Self {
        Self {
            store: DocumentStore::new(),
            splitter: TextSplitter::new(config.chunk_size, config.chunk_overlap),
            embedder,
            completion,
            top_k: config.top_k,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn upload(&self, file: UploadedFile) -> Result<RagUploadResult, CapabilityError> {
        if file.bytes.is_empty() {
            return Err(CapabilityError::InvalidInput("No file uploaded".to_string()));
        }
        let content_type = resolve_content_type(file.content_type.as_deref(), &file.filename);
        let text = extract_text(&file.bytes, &content_type).map_err(|e| {
            CapabilityError::Extraction(format!("Failed to process {}: {}", file.filename, e))
        })?;

        let pieces = self.splitter.split(&text);
        if pieces.is_empty() {
            return Err(CapabilityError::Extraction(format!(
                "Failed to process {}: no text content found",
                file.filename
            )));
        }
        let embeddings = self.embedder.embed_batch(&pieces);
        let uploaded_at = Utc::now();
        let chunks: Vec<DocumentChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| DocumentChunk {
                id: Uuid::new_v4(),
                source: file.filename.clone(),
                index,
                text,
                embedding,
                uploaded_at,
            })
            .collect();

        let chunk_count = chunks.len();
        let total_documents = self.store.add(chunks);
        tracing::info!(
            filename = %file.filename,
            %content_type,
            chunk_count,
            total_documents,
            embedder = self.embedder.name(),
            dims = self.embedder.dims(),
            "document indexed"
        );

        Ok(RagUploadResult {
            message: format!(
                "Successfully processed {} into {} chunks.",
                file.filename, chunk_count
            ),
            filename: file.filename,
            chunk_count,
            total_documents,
        })
    }

    pub async fn query(&self, question: &str) -> Result<RagQueryResult, CapabilityError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CapabilityError::InvalidInput("Question is required".to_string()));
        }
        if self.store.document_count() == 0 {
            return Err(CapabilityError::NoDocuments);
        }

        let query = self.embedder.embed(question);
        let context = self
            .store
            .top_k(&query, self.top_k)
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Answer the question based only on the following context. If you cannot answer \
             the question based on the context, say \"{}\"\n\nContext: {}\n\nQuestion: {}\n\nAnswer:",
            NOT_ENOUGH_INFORMATION, context, question
        );
        let answer = complete_once(
            self.completion.as_ref(),
            "rag",
            vec![ChatMessage::new(Role::User, prompt)],
        )
        .await?;

        Ok(RagQueryResult {
            question: question.to_string(),
            answer: answer.trim().to_string(),
            total_documents: self.store.document_count(),
        })
    }

    pub fn clear(&self) {
        self.store.clear();
        tracing::info!("document store cleared");
    }

    pub fn status(&self) -> RagStatus {
        let total_documents = self.store.document_count();
        RagStatus {
            total_documents,
            total_chunks: self.store.chunk_count(),
            has_documents: total_documents > 0,
            status: if total_documents > 0 {
                "Ready to answer questions"
            } else {
                "No documents uploaded"
            }
            .to_string(),
        }
    }
}
