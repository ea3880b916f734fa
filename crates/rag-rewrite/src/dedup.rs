//! Semantic deduplication of query variants.
//!
//! Exact duplicates (case-insensitive) go first, then near-duplicates by
//! embedding cosine similarity. When a pair is too similar the shorter
//! phrasing is kept.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use rag_core::{cosine_similarity, Embedder};

/// Pairs scoring above this are considered the same query.
pub const SIMILARITY_THRESHOLD: f32 = 0.95;

/// Two variants whose embeddings are too similar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityPair {
    pub index_a: usize,
    pub index_b: usize,
    pub score: f32,
}

/// Outcome of one deduplication pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupReport {
    /// Surviving variants, in their original relative order.
    pub variants: Vec<String>,

    /// Variants dropped as case-insensitive exact duplicates.
    pub exact_removed: usize,

    /// Variants dropped as semantic near-duplicates.
    pub semantic_removed: usize,

    /// Embedding failure that caused the semantic pass to be skipped.
    pub error: Option<String>,
}

impl DedupReport {
    /// Total number of variants removed.
    pub fn removed(&self) -> usize {
        self.exact_removed + self.semantic_removed
    }
}

/// Removes exact and near-duplicate query variants.
pub struct SemanticDeduplicator<E> {
    embedder: Arc<E>,
}

impl<E> Clone for SemanticDeduplicator<E> {
    fn clone(&self) -> Self {
        Self {
            embedder: self.embedder.clone(),
        }
    }
}

impl<E> SemanticDeduplicator<E>
where
    E: Embedder,
{
    pub fn new(embedder: Arc<E>) -> Self {
        Self { embedder }
    }

    /// Deduplicate variants, returning the survivors.
    pub async fn deduplicate(&self, variants: Vec<String>) -> Vec<String> {
        self.run(variants).await.variants
    }

    /// Deduplicate variants and report what was removed.
    ///
    /// Embedding failures skip the semantic pass; exact-duplicate removal
    /// still applies.
    pub async fn run(&self, variants: Vec<String>) -> DedupReport {
        let before = variants.len();
        let unique = remove_exact_duplicates(variants);
        let mut report = DedupReport {
            exact_removed: before - unique.len(),
            ..Default::default()
        };

        if unique.len() <= 1 {
            report.variants = unique;
            return report;
        }

        let texts: Vec<&str> = unique.iter().map(String::as_str).collect();
        let embeddings = match self.embedder.embed(&texts).await {
            Ok(embeddings) if embeddings.len() == unique.len() => embeddings,
            Ok(embeddings) => {
                let message = format!(
                    "embedding service returned {} vectors for {} variants",
                    embeddings.len(),
                    unique.len()
                );
                warn!("Skipping semantic deduplication: {}", message);
                report.error = Some(message);
                report.variants = unique;
                return report;
            }
            Err(e) => {
                warn!("Error calculating semantic similarity: {}", e);
                report.error = Some(e.to_string());
                report.variants = unique;
                return report;
            }
        };

        let pairs = similar_pairs(&embeddings);
        let to_remove = select_removals(&unique, &pairs);

        if !to_remove.is_empty() {
            info!(
                "Removed {} semantically similar queries",
                to_remove.len()
            );
        }

        report.semantic_removed = to_remove.len();
        report.variants = unique
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !to_remove.contains(idx))
            .map(|(_, q)| q)
            .collect();
        report
    }
}

/// Drop case-insensitive duplicates; the first occurrence wins.
pub fn remove_exact_duplicates(variants: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    variants
        .into_iter()
        .filter(|q| seen.insert(q.trim().to_lowercase()))
        .collect()
}

/// Every unordered pair scoring above [`SIMILARITY_THRESHOLD`].
pub fn similar_pairs(embeddings: &[Vec<f32>]) -> Vec<SimilarityPair> {
    let mut pairs = Vec::new();
    for i in 0..embeddings.len() {
        for j in (i + 1)..embeddings.len() {
            let score = cosine_similarity(&embeddings[i], &embeddings[j]);
            if score > SIMILARITY_THRESHOLD {
                pairs.push(SimilarityPair {
                    index_a: i,
                    index_b: j,
                    score,
                });
            }
        }
    }
    pairs
}

/// Indices to drop: the longer member of each pair, the second on ties.
pub fn select_removals(variants: &[String], pairs: &[SimilarityPair]) -> HashSet<usize> {
    pairs
        .iter()
        .map(|pair| {
            let len_a = variants[pair.index_a].chars().count();
            let len_b = variants[pair.index_b].chars().count();
            if len_a > len_b {
                pair.index_a
            } else {
                pair.index_b
            }
        })
        .collect()
}
