//! Bounded FIFO cache of rewrite results.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::debug;

use rag_core::{Context, RewriteResult, RewriteStrategy};

/// Maximum number of cached rewrites.
pub const REWRITE_CACHE_CAPACITY: usize = 100;

/// Digest identifying one rewrite request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a rewrite request.
    ///
    /// An absent and an empty context produce the same key. Context is only
    /// rendered, never interpreted.
    pub fn new(
        query: &str,
        strategy: RewriteStrategy,
        max_variants: usize,
        context: Option<&Context>,
    ) -> Self {
        let context_str = match context {
            Some(ctx) if !ctx.is_empty() => serde_json::Value::Object(ctx.clone()).to_string(),
            _ => String::new(),
        };
        let combined = format!("{}:{}:{}:{}", query, strategy, max_variants, context_str);
        let digest = blake3::hash(combined.as_bytes());
        Self(hex::encode(digest.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, RewriteResult>,
    order: VecDeque<CacheKey>,
}

/// Rewrite cache with strict insertion-order eviction.
///
/// Shared by reference (usually behind an `Arc`); all access is serialised by
/// an internal mutex. Reads do not affect eviction order.
pub struct RewriteCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl RewriteCache {
    /// Create an empty cache holding at most [`REWRITE_CACHE_CAPACITY`] entries.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: REWRITE_CACHE_CAPACITY,
        }
    }

    /// Look up a cached rewrite.
    pub fn get(&self, key: &CacheKey) -> Option<RewriteResult> {
        self.lock().entries.get(key).cloned()
    }

    /// Store a rewrite, evicting the oldest entry when full.
    ///
    /// Replacing an existing key keeps its original insertion position.
    pub fn put(&self, key: CacheKey, result: RewriteResult) {
        let mut inner = self.lock();

        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = result;
            return;
        }

        if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                debug!("Evicted cached rewrite {}", oldest);
            }
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, result);
    }

    /// Number of cached rewrites.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached rewrites.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RewriteCache {
    fn default() -> Self {
        Self::new()
    }
}
