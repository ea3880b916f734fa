//! Core domain types for query rewriting and retrieval fusion.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::error::RagError;

/// Opaque caller context (conversation turns, preferences, ...).
///
/// Only used as prompt input and cache-key material; never mutated.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Strategy-specific metadata attached to a rewrite result.
pub type Diagnostics = BTreeMap<String, serde_json::Value>;

/// Context key rendered into prompts when present.
pub const CONVERSATION_HISTORY_KEY: &str = "conversation_history";

/// Syntactic complexity of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityClass {
    Simple,
    Medium,
    Complex,
}

impl ComplexityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
        }
    }
}

impl std::fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested rewrite strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteStrategy {
    /// Synonyms, related terms and alternative phrasings.
    Expansion,
    /// Split a compound query into focused sub-queries.
    Decomposition,
    /// A single, more specific phrasing.
    Refinement,
    /// Pick and sequence the others based on query complexity.
    Hybrid,
}

impl RewriteStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expansion => "expansion",
            Self::Decomposition => "decomposition",
            Self::Refinement => "refinement",
            Self::Hybrid => "hybrid",
        }
    }
}

impl Default for RewriteStrategy {
    fn default() -> Self {
        Self::Hybrid
    }
}

impl std::fmt::Display for RewriteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewriteStrategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expansion" => Ok(Self::Expansion),
            "decomposition" => Ok(Self::Decomposition),
            "refinement" => Ok(Self::Refinement),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(RagError::invalid_argument(format!(
                "unknown rewrite strategy: {other}"
            ))),
        }
    }
}

/// Strategy that actually produced a rewrite result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyUsed {
    Expansion,
    Decomposition,
    Refinement,
    Hybrid,
    None,
}

/// Outcome of rewriting one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteResult {
    /// The query as the caller supplied it.
    pub original: String,

    /// Query variants in generation order. Never empty.
    pub variants: Vec<String>,

    /// Strategy that produced the variants.
    pub strategy_used: StrategyUsed,

    /// Strategy-specific metadata (counts, flags, sub-strategies).
    #[serde(default)]
    pub diagnostics: Diagnostics,

    /// Failure description when generation degraded to identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RewriteResult {
    /// A result whose only variant is the original query.
    pub fn identity(original: &str, strategy_used: StrategyUsed) -> Self {
        Self {
            original: original.to_string(),
            variants: vec![original.to_string()],
            strategy_used,
            diagnostics: Diagnostics::new(),
            error: None,
        }
    }

    /// Identity result carrying a generation failure.
    pub fn failed(original: &str, strategy_used: StrategyUsed, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::identity(original, strategy_used)
        }
    }

    /// Attach a diagnostic value.
    pub fn with_diagnostic(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.diagnostics.insert(key.to_string(), value.into());
        self
    }

    /// First variant, which every strategy fills with its primary output.
    pub fn primary(&self) -> &str {
        self.variants
            .first()
            .map(String::as_str)
            .unwrap_or(self.original.as_str())
    }

    /// Whether the rewrite produced anything beyond the original query.
    pub fn is_identity(&self) -> bool {
        self.variants.len() == 1 && self.variants[0] == self.original
    }
}

/// A single hit from the vector search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Chunk text.
    pub content: String,

    /// Backend-provided metadata (source, page, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Relevance score; scale is backend-defined, higher is better.
    pub score: f32,
}

impl RetrievedDocument {
    pub fn new(content: impl Into<String>, score: f32) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
            score,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Documents merged from several variant searches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusedResultSet {
    /// Unique by content, sorted by descending score.
    pub documents: Vec<RetrievedDocument>,

    /// Number of variant searches issued.
    pub queries_issued: usize,

    /// Variants whose search failed and contributed no hits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_variants: Vec<String>,
}

impl FusedResultSet {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Whether any variant search failed.
    pub fn is_degraded(&self) -> bool {
        !self.failed_variants.is_empty()
    }
}

/// Output of a full rewrite-then-retrieve query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// The original query.
    pub query: String,

    /// Rewrite applied before retrieval, if rewriting is enabled.
    pub rewrite: Option<RewriteResult>,

    /// Retrieved documents, best first.
    pub documents: Vec<RetrievedDocument>,

    /// Variants whose search failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_variants: Vec<String>,

    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "expansion".parse::<RewriteStrategy>().unwrap(),
            RewriteStrategy::Expansion
        );
        assert_eq!(
            " Hybrid ".parse::<RewriteStrategy>().unwrap(),
            RewriteStrategy::Hybrid
        );
        assert!("rerank".parse::<RewriteStrategy>().is_err());
    }

    #[test]
    fn test_strategy_serde_lowercase() {
        let json = serde_json::to_string(&RewriteStrategy::Decomposition).unwrap();
        assert_eq!(json, "\"decomposition\"");
        let used: StrategyUsed = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(used, StrategyUsed::None);
    }

    #[test]
    fn test_identity_result() {
        let result = RewriteResult::identity("what is rust", StrategyUsed::Refinement);
        assert_eq!(result.variants, vec!["what is rust".to_string()]);
        assert!(result.is_identity());
        assert!(result.error.is_none());
        assert_eq!(result.primary(), "what is rust");
    }

    #[test]
    fn test_failed_result_keeps_original() {
        let result = RewriteResult::failed("q", StrategyUsed::Expansion, "timeout");
        assert_eq!(result.variants, vec!["q".to_string()]);
        assert_eq!(result.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_rewrite_result_roundtrips_through_json() {
        let result = RewriteResult::identity("q", StrategyUsed::Hybrid)
            .with_diagnostic("complexity", "simple");
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("\"error\""));
        let back: RewriteResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
