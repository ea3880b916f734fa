//! Query rewriter: cache, strategy dispatch and deduplication.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use rag_core::{
    CompletionService, Context, Embedder, RagError, Result, RewriteConfig, RewriteResult,
    RewriteStrategy, StrategyUsed,
};

use crate::cache::{CacheKey, RewriteCache};
use crate::classifier::{adaptive_budget, classify};
use crate::dedup::SemanticDeduplicator;
use crate::generator::{BaseStrategy, VariantGenerator};
use crate::hybrid::HybridOrchestrator;

/// Rewrites user queries into several variants for multi-query retrieval.
///
/// Results are cached per (query, strategy, requested variants, context) in
/// a [`RewriteCache`] that may be shared between rewriters.
pub struct QueryRewriter<C, E> {
    generator: VariantGenerator<C>,
    hybrid: HybridOrchestrator<C>,
    dedup: SemanticDeduplicator<E>,
    cache: Arc<RewriteCache>,
    strategy: RewriteStrategy,
    max_variants: usize,
}

impl<C, E> QueryRewriter<C, E>
where
    C: CompletionService,
    E: Embedder,
{
    /// Create a rewriter with its own cache.
    pub fn new(
        completion: Arc<C>,
        embedder: Arc<E>,
        strategy: RewriteStrategy,
        max_variants: usize,
    ) -> Result<Self> {
        Self::with_cache(
            completion,
            embedder,
            strategy,
            max_variants,
            Arc::new(RewriteCache::new()),
        )
    }

    /// Create a rewriter that stores results in `cache`.
    pub fn with_cache(
        completion: Arc<C>,
        embedder: Arc<E>,
        strategy: RewriteStrategy,
        max_variants: usize,
        cache: Arc<RewriteCache>,
    ) -> Result<Self> {
        if max_variants == 0 {
            return Err(RagError::invalid_argument("max_variants must be at least 1"));
        }

        let generator = VariantGenerator::new(completion);
        info!(
            "QueryRewriter initialized with strategy: {}, max_variants: {}, cache capacity: {}",
            strategy,
            max_variants,
            cache.capacity()
        );

        Ok(Self {
            hybrid: HybridOrchestrator::new(generator.clone()),
            generator,
            dedup: SemanticDeduplicator::new(embedder),
            cache,
            strategy,
            max_variants,
        })
    }

    /// Create a rewriter from configuration.
    pub fn from_config(
        completion: Arc<C>,
        embedder: Arc<E>,
        config: &RewriteConfig,
    ) -> Result<Self> {
        Self::new(completion, embedder, config.strategy, config.max_variants)
    }

    pub fn cache(&self) -> &Arc<RewriteCache> {
        &self.cache
    }

    /// Rewrite a query with the configured strategy.
    ///
    /// Never fails: service errors degrade to the original query and are
    /// reported through `error` and `diagnostics`.
    pub async fn rewrite(&self, query: &str, context: Option<&Context>) -> RewriteResult {
        if query.trim().is_empty() {
            debug!("Skipping rewrite of blank query");
            return RewriteResult::identity(query, StrategyUsed::None);
        }

        let key = CacheKey::new(query, self.strategy, self.max_variants, context);
        if let Some(cached) = self.cache.get(&key) {
            info!("Using cached rewrite for query: {:?}", query);
            return cached;
        }

        info!("Rewriting query: {:?} with strategy: {}", query, self.strategy);

        let class = classify(query);
        let budget = adaptive_budget(class, self.max_variants);
        if budget != self.max_variants {
            info!(
                "Adjusted max variants from {} to {} based on {} query complexity",
                self.max_variants, budget, class
            );
        }

        let mut result = match BaseStrategy::try_from(self.strategy) {
            Ok(base) => self.generator.generate(base, query, context, budget).await,
            Err(_) => self.hybrid.rewrite(query, context, class, budget).await,
        };

        if result.variants.len() > 1 {
            let report = self.dedup.run(std::mem::take(&mut result.variants)).await;
            if report.removed() > 0 {
                result
                    .diagnostics
                    .insert("deduplicated".to_string(), json!(true));
                result
                    .diagnostics
                    .insert("removed_duplicates".to_string(), json!(report.removed()));
            }
            if let Some(e) = report.error {
                result.diagnostics.insert("dedup_error".to_string(), json!(e));
            }
            result.variants = report.variants;
        }

        if result.variants.is_empty() {
            result.variants.push(query.to_string());
        }

        self.cache.put(key, result.clone());
        result
    }

    /// Rewrite several queries with the same context, in order.
    pub async fn batch_rewrite(
        &self,
        queries: &[&str],
        context: Option<&Context>,
    ) -> Vec<RewriteResult> {
        info!("Batch rewriting {} queries", queries.len());
        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            results.push(self.rewrite(query, context).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_llm::{MockCompletion, MockEmbedder};

    const REFINE: &str = "query refinement";
    const EXPAND: &str = "query expansion";
    const DECOMPOSE: &str = "query decomposition";

    type TestRewriter = QueryRewriter<MockCompletion, MockEmbedder>;

    fn rewriter(
        mock: MockCompletion,
        strategy: RewriteStrategy,
        max_variants: usize,
    ) -> (TestRewriter, Arc<MockCompletion>) {
        let mock = Arc::new(mock);
        let rewriter = QueryRewriter::new(
            mock.clone(),
            Arc::new(MockEmbedder::new()),
            strategy,
            max_variants,
        )
        .unwrap();
        (rewriter, mock)
    }

    #[test]
    fn test_zero_max_variants_rejected() {
        let result = QueryRewriter::new(
            Arc::new(MockCompletion::new()),
            Arc::new(MockEmbedder::new()),
            RewriteStrategy::Hybrid,
            0,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_second_rewrite_is_cache_hit() {
        let (rewriter, mock) = rewriter(
            MockCompletion::new().on(REFINE, "artificial intelligence definition"),
            RewriteStrategy::Hybrid,
            3,
        );
        let ctx = serde_json::json!({ "conversation_history": "talking about ML" })
            .as_object()
            .cloned()
            .unwrap();

        let first = rewriter.rewrite("What is AI?", Some(&ctx)).await;
        let calls_after_first = mock.call_count();
        let second = rewriter.rewrite("What is AI?", Some(&ctx)).await;

        assert_eq!(first, second);
        assert_eq!(mock.call_count(), calls_after_first);
        assert_eq!(rewriter.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_different_context_misses_cache() {
        let (rewriter, mock) = rewriter(MockCompletion::new(), RewriteStrategy::Refinement, 3);
        let ctx = serde_json::json!({ "conversation_history": "earlier" })
            .as_object()
            .cloned()
            .unwrap();

        rewriter.rewrite("how do lifetimes work", None).await;
        rewriter.rewrite("how do lifetimes work", Some(&ctx)).await;

        assert_eq!(mock.call_count(), 2);
        assert_eq!(rewriter.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_simple_query_scenario() {
        let (rewriter, mock) = rewriter(
            MockCompletion::new().on(REFINE, "artificial intelligence definition"),
            RewriteStrategy::Hybrid,
            3,
        );

        let result = rewriter.rewrite("What is AI?", None).await;

        assert_eq!(result.diagnostics["complexity"], "simple");
        assert!(result.variants.len() <= 2);
        assert_eq!(result.variants[0], "What is AI?");
        assert_eq!(mock.calls_matching(REFINE), 1);
        assert_eq!(mock.calls_matching(EXPAND), 0);
        assert_eq!(mock.calls_matching(DECOMPOSE), 0);
    }

    #[tokio::test]
    async fn test_complex_query_scenario_decomposes_first() {
        let (rewriter, mock) = rewriter(
            MockCompletion::new().on(
                DECOMPOSE,
                "postgres write heavy performance\nmysql write heavy performance\ndurability guarantees postgres mysql",
            ),
            RewriteStrategy::Hybrid,
            3,
        );
        let query = "please compare postgres versus mysql for a write heavy workload \
                     with many concurrent writers and strict durability needs overall today";

        let result = rewriter.rewrite(query, None).await;

        assert_eq!(result.diagnostics["complexity"], "complex");
        assert_eq!(mock.calls()[0].system_prompt, crate::prompts::DECOMPOSITION_SYSTEM);
        assert_eq!(result.variants.len(), 3);
        assert_eq!(result.strategy_used, StrategyUsed::Hybrid);
    }

    #[tokio::test]
    async fn test_total_failure_degrades_to_identity() {
        let (rewriter, _) = rewriter(MockCompletion::failing("no quota"), RewriteStrategy::Hybrid, 3);

        let query = "how does the garbage collector handle cycles";
        let result = rewriter.rewrite(query, None).await;

        assert_eq!(result.variants, vec![query.to_string()]);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_base_strategy_uses_adaptive_budget() {
        let (rewriter, mock) = rewriter(
            MockCompletion::new().on(
                EXPAND,
                "first alternative phrasing\nsecond alternative phrasing\nthird alternative phrasing",
            ),
            RewriteStrategy::Expansion,
            3,
        );

        // simple query: budget drops from 3 to 2
        let result = rewriter.rewrite("rust lifetimes", None).await;

        assert!(mock.calls()[0].user_prompt.contains("Write 2 SPECIFIC"));
        assert_eq!(
            result.variants,
            vec![
                "rust lifetimes",
                "first alternative phrasing",
                "second alternative phrasing"
            ]
        );
        assert_eq!(result.strategy_used, StrategyUsed::Expansion);
    }

    #[tokio::test]
    async fn test_semantic_dedup_applied_and_recorded() {
        let mock = Arc::new(MockCompletion::new().on(
            EXPAND,
            "find all the cats nearby\nadopt a kitten locally",
        ));
        let embedder = MockEmbedder::new()
            .with_vector("find cats near me", vec![1.0, 0.0, 0.0])
            .with_vector("find all the cats nearby", vec![0.99, 0.05, 0.0])
            .with_vector("adopt a kitten locally", vec![0.0, 1.0, 0.0]);
        let rewriter = QueryRewriter::new(
            mock,
            Arc::new(embedder),
            RewriteStrategy::Expansion,
            3,
        )
        .unwrap();

        let result = rewriter.rewrite("find cats near me", None).await;

        assert_eq!(
            result.variants,
            vec!["find cats near me", "adopt a kitten locally"]
        );
        assert_eq!(result.diagnostics["deduplicated"], true);
        assert_eq!(result.diagnostics["removed_duplicates"], 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_recorded() {
        let mock = Arc::new(MockCompletion::new().on(
            EXPAND,
            "first alternative phrasing\nsecond alternative phrasing",
        ));
        let rewriter = QueryRewriter::new(
            mock,
            Arc::new(MockEmbedder::failing("embeddings offline")),
            RewriteStrategy::Expansion,
            3,
        )
        .unwrap();

        let result = rewriter.rewrite("rust lifetimes", None).await;

        assert_eq!(result.variants.len(), 3);
        assert!(result.diagnostics["dedup_error"]
            .as_str()
            .unwrap()
            .contains("embeddings offline"));
    }

    #[tokio::test]
    async fn test_blank_query_not_rewritten() {
        let (rewriter, mock) = rewriter(MockCompletion::new(), RewriteStrategy::Hybrid, 3);

        let result = rewriter.rewrite("   ", None).await;

        assert_eq!(result.strategy_used, StrategyUsed::None);
        assert_eq!(result.variants, vec!["   ".to_string()]);
        assert_eq!(mock.call_count(), 0);
        assert!(rewriter.cache().is_empty());
    }

    #[tokio::test]
    async fn test_shared_cache_between_rewriters() {
        let cache = Arc::new(RewriteCache::new());
        let mock = Arc::new(MockCompletion::new().on(REFINE, "artificial intelligence definition"));
        let a = QueryRewriter::with_cache(
            mock.clone(),
            Arc::new(MockEmbedder::new()),
            RewriteStrategy::Hybrid,
            3,
            cache.clone(),
        )
        .unwrap();
        let b = QueryRewriter::with_cache(
            mock.clone(),
            Arc::new(MockEmbedder::new()),
            RewriteStrategy::Hybrid,
            3,
            cache.clone(),
        )
        .unwrap();

        let first = a.rewrite("What is AI?", None).await;
        let calls = mock.call_count();
        let second = b.rewrite("What is AI?", None).await;

        assert_eq!(first, second);
        assert_eq!(mock.call_count(), calls);
    }

    #[tokio::test]
    async fn test_batch_rewrite_preserves_order() {
        let (rewriter, _) = rewriter(MockCompletion::new(), RewriteStrategy::Refinement, 3);

        let results = rewriter
            .batch_rewrite(&["first query here", "second query here"], None)
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].original, "first query here");
        assert_eq!(results[1].original, "second query here");
    }
}
