//! Embedding abstraction for document retrieval.
//!
//! Defines the [`Embedder`] trait and the [`HashEmbedder`] placeholder, plus
//! [`cosine_similarity`] for ranking.
//!
//! [`HashEmbedder`] is a hashed bag-of-words: every whitespace-separated word
//! is assigned to one of `dims` buckets by the sum of its character codes.
//! It is deterministic and cheap but carries no semantics; documents that
//! share exact words score higher and nothing more. A real embedding model
//! can replace it behind the same trait.

/// Turns text into a fixed-length vector.
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dims(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;

    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn bucket(&self, word: &str) -> usize {
        let code_sum: u64 = word.chars().map(|c| c as u64).sum();
        (code_sum % self.dims as u64) as usize
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash-bag-of-words"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for word in text.split_whitespace() {
            vector[self.bucket(word)] += 1.0;
        }
        vector
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths and zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
