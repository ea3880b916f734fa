//! In-memory vector index.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fusion::descending_score;
use rag_core::{cosine_similarity, Embedder, RagError, Result, RetrievedDocument, VectorSearch};

/// A document to be indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub content: String,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl IndexDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }
}

struct Row {
    document: IndexDocument,
    embedding: Vec<f32>,
}

/// Brute-force cosine similarity index held in memory.
pub struct MemoryIndex<E> {
    embedder: Arc<E>,
    rows: RwLock<Vec<Row>>,
}

impl<E> MemoryIndex<E>
where
    E: Embedder,
{
    pub fn new(embedder: Arc<E>) -> Self {
        Self {
            embedder,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Embed and insert documents in one batch.
    pub async fn add_documents(&self, documents: Vec<IndexDocument>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(RagError::embedding(format!(
                "expected {} embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }

        let count = documents.len();
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        rows.extend(
            documents
                .into_iter()
                .zip(embeddings)
                .map(|(document, embedding)| Row {
                    document,
                    embedding,
                }),
        );

        info!("Indexed {} documents ({} total)", count, rows.len());
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<E> VectorSearch for MemoryIndex<E>
where
    E: Embedder,
{
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDocument>> {
        let query_embedding = self.embedder.embed_one(query).await?;

        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<(usize, f32)> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| (idx, cosine_similarity(&query_embedding, &row.embedding)))
            .collect();

        scored.sort_by(|a, b| descending_score(a.1, b.1));
        scored.truncate(top_k);

        debug!("Index search for {:?} returned {} hits", query, scored.len());

        Ok(scored
            .into_iter()
            .map(|(idx, score)| {
                let document = &rows[idx].document;
                RetrievedDocument {
                    content: document.content.clone(),
                    metadata: document.metadata.clone(),
                    score,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_llm::MockEmbedder;

    fn embedder() -> MockEmbedder {
        MockEmbedder::new()
            .with_vector("rust ownership rules", vec![1.0, 0.0, 0.0])
            .with_vector("python garbage collection", vec![0.0, 1.0, 0.0])
            .with_vector("borrow checker", vec![0.9, 0.1, 0.0])
            .with_vector("memory management", vec![0.5, 0.5, 0.0])
    }

    #[tokio::test]
    async fn test_search_ranks_by_cosine() {
        let index = MemoryIndex::new(Arc::new(embedder()));
        index
            .add_documents(vec![
                IndexDocument::new("python garbage collection"),
                IndexDocument::new("rust ownership rules"),
            ])
            .await
            .unwrap();

        let hits = index.search("borrow checker", 5).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "rust ownership rules");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_nan_similarity_ranks_last() {
        let embedder = embedder().with_vector("corrupt row", vec![f32::NAN, 0.0, 0.0]);
        let index = MemoryIndex::new(Arc::new(embedder));
        index
            .add_documents(vec![
                IndexDocument::new("corrupt row"),
                IndexDocument::new("python garbage collection"),
                IndexDocument::new("rust ownership rules"),
            ])
            .await
            .unwrap();

        let hits = index.search("borrow checker", 3).await.unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].content, "rust ownership rules");
        assert_eq!(hits[2].content, "corrupt row");
        assert!(hits[2].score.is_nan());
    }

    #[tokio::test]
    async fn test_search_respects_top_k() {
        let index = MemoryIndex::new(Arc::new(embedder()));
        index
            .add_documents(vec![
                IndexDocument::new("python garbage collection"),
                IndexDocument::new("rust ownership rules"),
            ])
            .await
            .unwrap();

        let hits = index.search("memory management", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_add_documents_single_batch_and_metadata() {
        let embedder = Arc::new(embedder());
        let index = MemoryIndex::new(embedder.clone());

        let mut doc = IndexDocument::new("rust ownership rules");
        doc.metadata
            .insert("source".to_string(), serde_json::json!("book.md"));
        let added = index
            .add_documents(vec![doc, IndexDocument::new("python garbage collection")])
            .await
            .unwrap();

        assert_eq!(added, 2);
        assert_eq!(index.len(), 2);
        assert_eq!(embedder.batch_count(), 1);

        let hits = index.search("borrow checker", 1).await.unwrap();
        assert_eq!(hits[0].metadata["source"], "book.md");
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let index = MemoryIndex::new(Arc::new(MockEmbedder::failing("offline")));

        let err = index
            .add_documents(vec![IndexDocument::new("anything at all")])
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "EMBEDDING_ERROR");

        assert!(index.search("anything", 3).await.is_err());
    }
}
