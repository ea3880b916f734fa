//! rag-llm - Completion and embedding service clients
//!
//! This crate talks to the external language-model services the rewriter
//! depends on.
//!
//! # Features
//!
//! - OpenAI-compatible chat completions (`/v1/chat/completions`)
//! - OpenAI-compatible batched embeddings (`/v1/embeddings`)
//! - Scripted mock services for tests that don't need a network

mod mock;
mod openai;

pub use mock::{MockCompletion, MockEmbedder, RecordedCall};
pub use openai::OpenAiClient;

// Re-export the service traits for convenience
pub use rag_core::{CompletionService, Embedder};
