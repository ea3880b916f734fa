//! rag-query - Multi-query retrieval
//!
//! This crate runs rewritten query variants against a vector search backend
//! and fuses the hits into one ranked list.
//!
//! # Features
//!
//! - Concurrent per-variant search with partial-failure tolerance
//! - First-seen deduplication by content, stable descending sort
//! - In-memory cosine index for local corpora and tests
//! - Rewrite-then-retrieve `QueryEngine`
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_query::{MemoryIndex, QueryEngine};
//! use std::sync::Arc;
//!
//! let engine = QueryEngine::with_rewriter(Arc::new(index), rewriter);
//! let results = engine.search("error handling", None, 5).await?;
//! ```

mod engine;
mod fusion;
mod index;

pub use engine::QueryEngine;
pub use fusion::{fuse, retrieve_fused};
pub use index::{IndexDocument, MemoryIndex};

// Re-export for convenience
pub use rag_core::{FusedResultSet, RetrievedDocument, SearchResults};
