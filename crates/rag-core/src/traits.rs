//! Core traits defining the interfaces to external services.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RetrievedDocument;

/// Language-model completion service.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Run one chat completion and return the assistant text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String>;
}

/// Embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Returns one vector per input, in input order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::RagError::embedding("no embedding returned"))
    }
}

/// Vector search backend.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Return up to `top_k` hits for `query`, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDocument>>;
}
