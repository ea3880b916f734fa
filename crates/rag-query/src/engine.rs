//! Query engine: rewrite, then retrieve.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use rag_core::{
    CompletionService, Context, Embedder, Result, RewriteResult, SearchResults, VectorSearch,
};
use rag_rewrite::QueryRewriter;

use crate::fusion::retrieve_fused;

/// Rewrite-then-retrieve pipeline over a vector search backend.
///
/// Without a rewriter every query is searched as-is.
pub struct QueryEngine<S, C, E> {
    /// Search backend.
    backend: Arc<S>,

    /// Query rewriter, if rewriting is enabled.
    rewriter: Option<QueryRewriter<C, E>>,

    /// Cap on returned documents.
    result_limit: Option<usize>,
}

impl<S, C, E> QueryEngine<S, C, E>
where
    S: VectorSearch + 'static,
    C: CompletionService,
    E: Embedder,
{
    /// Create an engine that searches queries as-is.
    pub fn new(backend: Arc<S>) -> Self {
        Self {
            backend,
            rewriter: None,
            result_limit: None,
        }
    }

    /// Create an engine that rewrites queries before searching.
    pub fn with_rewriter(backend: Arc<S>, rewriter: QueryRewriter<C, E>) -> Self {
        Self {
            backend,
            rewriter: Some(rewriter),
            result_limit: None,
        }
    }

    /// Return at most `limit` documents per search. `None` keeps every
    /// unique hit from every variant.
    pub fn with_result_limit(mut self, limit: Option<usize>) -> Self {
        self.result_limit = limit;
        self
    }

    /// Rewrite `query` and retrieve up to `top_k` hits per variant.
    ///
    /// A single variant is searched directly and any backend error is
    /// returned. Several variants are fused; see [`retrieve_fused`].
    pub async fn search(
        &self,
        query: &str,
        context: Option<&Context>,
        top_k: usize,
    ) -> Result<SearchResults> {
        let start = Instant::now();

        info!("Searching for: {:?}", query);

        let rewrite = match &self.rewriter {
            Some(rewriter) => Some(rewriter.rewrite(query, context).await),
            None => None,
        };
        let variants = match &rewrite {
            Some(result) if !result.variants.is_empty() => result.variants.clone(),
            _ => vec![query.to_string()],
        };

        debug!("Searching with {} query variants", variants.len());

        let (mut documents, failed_variants) = if variants.len() == 1 {
            let documents = self.backend.search(&variants[0], top_k).await?;
            (documents, Vec::new())
        } else {
            let fused = retrieve_fused(self.backend.clone(), &variants, top_k).await?;
            (fused.documents, fused.failed_variants)
        };
        if let Some(limit) = self.result_limit {
            documents.truncate(limit);
        }

        let latency_ms = start.elapsed().as_millis() as u64;

        info!(
            "Search completed in {}ms, returned {} results",
            latency_ms,
            documents.len()
        );

        Ok(SearchResults {
            query: query.to_string(),
            rewrite,
            documents,
            failed_variants,
            latency_ms,
        })
    }

    /// Rewrite several queries without retrieving.
    ///
    /// Without a rewriter each query is returned unchanged.
    pub async fn batch_rewrite(
        &self,
        queries: &[&str],
        context: Option<&Context>,
    ) -> Vec<RewriteResult> {
        match &self.rewriter {
            Some(rewriter) => rewriter.batch_rewrite(queries, context).await,
            None => queries
                .iter()
                .map(|q| RewriteResult::identity(*q, rag_core::StrategyUsed::None))
                .collect(),
        }
    }
}
