//! Multi-query retrieval fusion.
//!
//! One backend search per query variant, run concurrently, merged in variant
//! order once every search has finished.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use rag_core::{FusedResultSet, RagError, Result, RetrievedDocument, VectorSearch};

/// Search every variant and fuse the hits.
///
/// A failing variant contributes no hits and is listed in `failed_variants`.
/// Fails only when `variants` is empty or every search fails.
pub async fn retrieve_fused<S>(
    backend: Arc<S>,
    variants: &[String],
    top_k: usize,
) -> Result<FusedResultSet>
where
    S: VectorSearch + 'static,
{
    if variants.is_empty() {
        return Err(RagError::invalid_argument(
            "at least one query variant is required",
        ));
    }

    info!(
        "Retrieving with {} query variants, top_k={}",
        variants.len(),
        top_k
    );

    let mut tasks = JoinSet::new();
    for (idx, variant) in variants.iter().enumerate() {
        let backend = backend.clone();
        let variant = variant.clone();
        tasks.spawn(async move { (idx, backend.search(&variant, top_k).await) });
    }

    let mut outcomes: Vec<Option<Result<Vec<RetrievedDocument>>>> =
        (0..variants.len()).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
            Err(e) => warn!("Variant search task aborted: {}", e),
        }
    }

    let mut hit_lists = Vec::with_capacity(variants.len());
    let mut failed_variants = Vec::new();
    let mut last_error = None;

    for (variant, outcome) in variants.iter().zip(outcomes) {
        match outcome {
            Some(Ok(hits)) => {
                debug!("Variant {:?} returned {} hits", variant, hits.len());
                hit_lists.push(hits);
            }
            Some(Err(e)) => {
                warn!("Error retrieving for query {:?}: {}", variant, e);
                last_error = Some(e);
                failed_variants.push(variant.clone());
            }
            None => {
                last_error = Some(RagError::internal("search task did not complete"));
                failed_variants.push(variant.clone());
            }
        }
    }

    if failed_variants.len() == variants.len() {
        return Err(RagError::retrieval(format!(
            "all {} variant searches failed: {}",
            variants.len(),
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )));
    }

    let documents = fuse(hit_lists);

    info!(
        "Retrieved {} unique documents from {} queries",
        documents.len(),
        variants.len()
    );

    Ok(FusedResultSet {
        documents,
        queries_issued: variants.len(),
        failed_variants,
    })
}

/// Merge hit lists: first occurrence of each content wins, then a stable
/// sort by descending score.
pub fn fuse(hit_lists: Vec<Vec<RetrievedDocument>>) -> Vec<RetrievedDocument> {
    let mut seen = HashSet::new();
    let mut merged: Vec<RetrievedDocument> = hit_lists
        .into_iter()
        .flatten()
        .filter(|doc| seen.insert(doc.content.clone()))
        .collect();

    merged.sort_by(|a, b| descending_score(a.score, b.score));
    merged
}

/// Total descending order on scores; NaN ranks below every number.
pub(crate) fn descending_score(a: f32, b: f32) -> Ordering {
    let key = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
    key(b).total_cmp(&key(a))
}
