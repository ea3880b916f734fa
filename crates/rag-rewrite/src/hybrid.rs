//! Hybrid strategy: pick and sequence the base strategies by complexity.
//!
//! The decision is a table from [`ComplexityClass`] to a [`HybridRoute`];
//! each route is a short fixed sequence of generator calls whose outputs are
//! combined by the pure helpers at the bottom of this module.

use serde_json::json;
use tracing::info;

use rag_core::{ComplexityClass, CompletionService, Context, RewriteResult, StrategyUsed};

use crate::generator::{VariantGenerator, MIN_VARIANT_CHARS};

/// A refinement shorter than this fraction of the original is not expanded.
pub const REFINED_LENGTH_RATIO: f64 = 0.7;

/// Variant budget of the expansion run on a simple query.
const SIMPLE_EXPANSION_BUDGET: usize = 2;

/// Sequence of sub-strategies run for one complexity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HybridRoute {
    /// Refine; expand only if refinement changed nothing.
    RefineFirst,
    /// Decompose; fall back to refine-then-expand if not decomposable.
    DecomposeFirst,
    /// Refine, then expand either the refined or the original query.
    RefineThenExpand,
}

/// Dispatch table from complexity class to route.
pub fn route(class: ComplexityClass) -> HybridRoute {
    match class {
        ComplexityClass::Simple => HybridRoute::RefineFirst,
        ComplexityClass::Complex => HybridRoute::DecomposeFirst,
        ComplexityClass::Medium => HybridRoute::RefineThenExpand,
    }
}

/// Sub-strategy calls made during one hybrid rewrite.
#[derive(Debug, Default)]
struct Trace {
    applied: Vec<&'static str>,
    errors: Vec<String>,
}

impl Trace {
    fn record(&mut self, name: &'static str, result: &RewriteResult) {
        self.applied.push(name);
        if let Some(e) = &result.error {
            self.errors.push(format!("{}: {}", name, e));
        }
    }

    fn all_failed(&self) -> bool {
        !self.applied.is_empty() && self.errors.len() == self.applied.len()
    }
}

/// Runs the hybrid decision procedure on top of a [`VariantGenerator`].
pub struct HybridOrchestrator<C> {
    generator: VariantGenerator<C>,
}

impl<C> HybridOrchestrator<C>
where
    C: CompletionService,
{
    pub fn new(generator: VariantGenerator<C>) -> Self {
        Self { generator }
    }

    /// Rewrite `query` along the route for `class`, producing at most
    /// `budget` variants.
    pub async fn rewrite(
        &self,
        query: &str,
        context: Option<&Context>,
        class: ComplexityClass,
        budget: usize,
    ) -> RewriteResult {
        let route = route(class);
        info!("Applying hybrid rewrite: complexity={}, route={:?}", class, route);

        let mut trace = Trace::default();
        let candidates = match route {
            HybridRoute::RefineFirst => self.refine_first(query, context, &mut trace).await,
            HybridRoute::DecomposeFirst => {
                self.decompose_first(query, context, budget, &mut trace)
                    .await
            }
            HybridRoute::RefineThenExpand => {
                self.refine_then_expand(query, context, budget, &mut trace)
                    .await
            }
        };

        let variants = finalize(query, candidates, budget);
        let num_variations = variants.len();

        info!(
            "Hybrid rewrite generated {} unique query variations using {:?}",
            num_variations,
            trace.applied
        );

        let mut result = RewriteResult {
            variants,
            ..RewriteResult::identity(query, StrategyUsed::Hybrid)
        };
        result = result
            .with_diagnostic("complexity", class.as_str())
            .with_diagnostic("strategies_applied", json!(trace.applied))
            .with_diagnostic("num_variations", num_variations);
        if !trace.errors.is_empty() {
            result = result.with_diagnostic("errors", json!(trace.errors));
        }
        if trace.all_failed() {
            result.error = Some(trace.errors.join("; "));
        }
        result
    }

    async fn refine_first(
        &self,
        query: &str,
        context: Option<&Context>,
        trace: &mut Trace,
    ) -> Vec<String> {
        let refined = self.generator.refine(query, context).await;
        trace.record("refinement", &refined);

        let refined_query = refined.primary();
        if refined_query != query {
            return vec![query.to_string(), refined_query.to_string()];
        }

        let expanded = self
            .generator
            .expand(query, context, SIMPLE_EXPANSION_BUDGET)
            .await;
        trace.record("expansion", &expanded);
        expanded
            .variants
            .into_iter()
            .take(SIMPLE_EXPANSION_BUDGET)
            .collect()
    }

    async fn decompose_first(
        &self,
        query: &str,
        context: Option<&Context>,
        budget: usize,
        trace: &mut Trace,
    ) -> Vec<String> {
        let decomposed = self.generator.decompose(query, context, budget).await;
        trace.record("decomposition", &decomposed);

        if was_decomposed(&decomposed) {
            return decomposed.variants;
        }

        let refined = self.generator.refine(query, context).await;
        trace.record("refinement", &refined);
        let refined_query = refined.primary();

        let expanded = self
            .generator
            .expand(refined_query, context, reduced_budget(budget))
            .await;
        trace.record("expansion", &expanded);

        merge_novel(query, refined_query, expanded.variants)
    }

    async fn refine_then_expand(
        &self,
        query: &str,
        context: Option<&Context>,
        budget: usize,
        trace: &mut Trace,
    ) -> Vec<String> {
        let refined = self.generator.refine(query, context).await;
        trace.record("refinement", &refined);
        let refined_query = refined.primary();

        if should_expand_refined(query, refined_query) {
            let expanded = self
                .generator
                .expand(refined_query, context, reduced_budget(budget))
                .await;
            trace.record("expansion", &expanded);
            merge_novel(query, refined_query, expanded.variants)
        } else {
            let expanded = self
                .generator
                .expand(query, context, budget.max(2))
                .await;
            trace.record("expansion", &expanded);
            expanded.variants
        }
    }
}

fn was_decomposed(result: &RewriteResult) -> bool {
    result
        .diagnostics
        .get("was_decomposed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Budget for expanding a refined query: one less than the total, at least 2.
pub fn reduced_budget(budget: usize) -> usize {
    budget.saturating_sub(1).max(2)
}

/// Whether the refined query changed and kept enough of the original's length.
pub fn should_expand_refined(original: &str, refined: &str) -> bool {
    if refined == original {
        return false;
    }
    let original_len = original.chars().count() as f64;
    let refined_len = refined.chars().count() as f64;
    refined_len >= original_len * REFINED_LENGTH_RATIO
}

/// `[original, refined]` followed by expansions equal to neither.
pub fn merge_novel(original: &str, refined: &str, expansions: Vec<String>) -> Vec<String> {
    let mut merged = vec![original.to_string(), refined.to_string()];
    merged.extend(
        expansions
            .into_iter()
            .filter(|q| q != original && q != refined),
    );
    merged
}

/// Trim, drop short and case-insensitively repeated entries, cap to `budget`.
///
/// Never returns an empty list: if nothing survives, the original is used.
pub fn finalize(original: &str, candidates: Vec<String>, budget: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut variants: Vec<String> = candidates
        .iter()
        .map(|q| q.trim())
        .filter(|q| q.chars().count() > MIN_VARIANT_CHARS)
        .filter(|q| seen.insert(q.to_lowercase()))
        .take(budget)
        .map(String::from)
        .collect();

    if variants.is_empty() {
        variants.push(original.to_string());
    }
    variants
}
