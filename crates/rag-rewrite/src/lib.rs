//! rag-rewrite - Adaptive query rewriting
//!
//! This crate turns one user query into a small set of search-ready variants
//! before retrieval.
//!
//! # Features
//!
//! - Syntactic complexity classification with an adaptive variant budget
//! - Expansion, decomposition and refinement strategies
//! - Hybrid orchestration that picks sub-strategies by complexity
//! - Semantic deduplication of variants via embeddings
//! - Bounded FIFO cache of rewrite results
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_rewrite::QueryRewriter;
//! use rag_core::RewriteStrategy;
//! use std::sync::Arc;
//!
//! let rewriter = QueryRewriter::new(Arc::new(llm), Arc::new(embedder), RewriteStrategy::Hybrid, 3)?;
//! let result = rewriter.rewrite("What is AI?", None).await;
//! println!("{:?}", result.variants);
//! ```

mod cache;
mod classifier;
mod dedup;
mod generator;
mod hybrid;
mod prompts;
mod rewriter;

pub use cache::{CacheKey, RewriteCache, REWRITE_CACHE_CAPACITY};
pub use classifier::{adaptive_budget, classify, COMPLEX_MIN_WORDS, SIMPLE_MAX_WORDS};
pub use dedup::{
    remove_exact_duplicates, select_removals, similar_pairs, DedupReport, SemanticDeduplicator,
    SimilarityPair, SIMILARITY_THRESHOLD,
};
pub use generator::{
    BaseStrategy, SamplingParams, VariantGenerator, DECOMPOSITION_PARAMS, EXPANSION_PARAMS,
    MIN_VARIANT_CHARS, REFINEMENT_PARAMS,
};
pub use hybrid::{route, HybridOrchestrator, HybridRoute};
pub use rewriter::QueryRewriter;
