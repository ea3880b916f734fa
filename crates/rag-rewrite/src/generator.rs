//! Variant generation for the base rewrite strategies.
//!
//! Each strategy issues exactly one completion call. Any service failure
//! degrades to the identity rewrite with `error` set; nothing is propagated.

use std::sync::Arc;

use tracing::{error, info};

use rag_core::{CompletionService, Context, RewriteResult, RewriteStrategy, StrategyUsed};

use crate::prompts;

/// Generated lines of this many characters or fewer are discarded.
pub const MIN_VARIANT_CHARS: usize = 10;

/// Sampling parameters of one strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

pub const EXPANSION_PARAMS: SamplingParams = SamplingParams {
    temperature: 0.4,
    max_tokens: 350,
};

pub const DECOMPOSITION_PARAMS: SamplingParams = SamplingParams {
    temperature: 0.3,
    max_tokens: 350,
};

pub const REFINEMENT_PARAMS: SamplingParams = SamplingParams {
    temperature: 0.1,
    max_tokens: 150,
};

/// A strategy backed by a single completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseStrategy {
    Expansion,
    Decomposition,
    Refinement,
}

impl BaseStrategy {
    pub fn params(&self) -> SamplingParams {
        match self {
            Self::Expansion => EXPANSION_PARAMS,
            Self::Decomposition => DECOMPOSITION_PARAMS,
            Self::Refinement => REFINEMENT_PARAMS,
        }
    }
}

impl TryFrom<RewriteStrategy> for BaseStrategy {
    type Error = RewriteStrategy;

    fn try_from(strategy: RewriteStrategy) -> Result<Self, Self::Error> {
        match strategy {
            RewriteStrategy::Expansion => Ok(Self::Expansion),
            RewriteStrategy::Decomposition => Ok(Self::Decomposition),
            RewriteStrategy::Refinement => Ok(Self::Refinement),
            RewriteStrategy::Hybrid => Err(strategy),
        }
    }
}

/// Prompt-driven variant generator.
pub struct VariantGenerator<C> {
    completion: Arc<C>,
}

impl<C> Clone for VariantGenerator<C> {
    fn clone(&self) -> Self {
        Self {
            completion: self.completion.clone(),
        }
    }
}

impl<C> VariantGenerator<C>
where
    C: CompletionService,
{
    /// Create a generator backed by a completion service.
    pub fn new(completion: Arc<C>) -> Self {
        Self { completion }
    }

    /// Run one base strategy.
    pub async fn generate(
        &self,
        strategy: BaseStrategy,
        query: &str,
        context: Option<&Context>,
        max_variants: usize,
    ) -> RewriteResult {
        match strategy {
            BaseStrategy::Expansion => self.expand(query, context, max_variants).await,
            BaseStrategy::Decomposition => self.decompose(query, context, max_variants).await,
            BaseStrategy::Refinement => self.refine(query, context).await,
        }
    }

    /// Expand the query with related terms and alternative phrasings.
    ///
    /// The original query is always the first variant, followed by at most
    /// `max_variants` expansions.
    pub async fn expand(
        &self,
        query: &str,
        context: Option<&Context>,
        max_variants: usize,
    ) -> RewriteResult {
        let prompt = prompts::expansion_prompt(query, context, max_variants);
        let text = match self
            .call(prompts::EXPANSION_SYSTEM, &prompt, EXPANSION_PARAMS)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!("Error expanding query: {}", e);
                return RewriteResult::failed(query, StrategyUsed::Expansion, e);
            }
        };

        let mut expansions = candidate_lines(&text);
        expansions.truncate(max_variants);

        info!("Query expanded into {} variations", expansions.len());

        let num_variations = expansions.len();
        let mut variants = Vec::with_capacity(num_variations + 1);
        variants.push(query.to_string());
        variants.extend(expansions);

        RewriteResult {
            variants,
            ..RewriteResult::identity(query, StrategyUsed::Expansion)
        }
        .with_diagnostic("num_variations", num_variations)
        .with_diagnostic("temperature", EXPANSION_PARAMS.temperature)
    }

    /// Split a compound query into focused sub-queries.
    ///
    /// Fewer than two surviving sub-queries means the query was not
    /// decomposable; the result is then the original alone.
    pub async fn decompose(
        &self,
        query: &str,
        context: Option<&Context>,
        max_variants: usize,
    ) -> RewriteResult {
        let prompt = prompts::decomposition_prompt(query, context, max_variants);
        let text = match self
            .call(prompts::DECOMPOSITION_SYSTEM, &prompt, DECOMPOSITION_PARAMS)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!("Error decomposing query: {}", e);
                return RewriteResult::failed(query, StrategyUsed::Decomposition, e)
                    .with_diagnostic("was_decomposed", false);
            }
        };

        let mut sub_queries = candidate_lines(&text);
        sub_queries.truncate(max_variants);

        info!("Query decomposed into {} sub-queries", sub_queries.len());

        let num_sub_queries = sub_queries.len();
        let was_decomposed = num_sub_queries > 1;
        let mut result = RewriteResult::identity(query, StrategyUsed::Decomposition);
        if was_decomposed {
            result.variants = sub_queries;
        }

        result
            .with_diagnostic("num_sub_queries", num_sub_queries)
            .with_diagnostic("was_decomposed", was_decomposed)
            .with_diagnostic("temperature", DECOMPOSITION_PARAMS.temperature)
    }

    /// Produce one more specific phrasing of the query.
    pub async fn refine(&self, query: &str, context: Option<&Context>) -> RewriteResult {
        let prompt = prompts::refinement_prompt(query, context);
        let text = match self
            .call(prompts::REFINEMENT_SYSTEM, &prompt, REFINEMENT_PARAMS)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!("Error refining query: {}", e);
                return RewriteResult::failed(query, StrategyUsed::Refinement, e)
                    .with_diagnostic("refined", false);
            }
        };

        let refined = parse_refinement(&text);
        let changed = !refined.is_empty() && refined != query;

        info!("Query refined: {:?} -> {:?}", query, refined);

        let mut result = RewriteResult::identity(query, StrategyUsed::Refinement);
        if changed {
            result.variants = vec![refined];
        }

        result
            .with_diagnostic("refined", changed)
            .with_diagnostic("temperature", REFINEMENT_PARAMS.temperature)
    }

    async fn call(
        &self,
        system: &str,
        user: &str,
        params: SamplingParams,
    ) -> rag_core::Result<String> {
        self.completion
            .complete(system, user, params.temperature as f32, params.max_tokens)
            .await
    }
}

/// Non-trivial lines of a completion, trimmed, in order.
pub(crate) fn candidate_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_VARIANT_CHARS)
        .map(String::from)
        .collect()
}

/// First non-empty line with any surrounding quotes removed.
fn parse_refinement(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}
