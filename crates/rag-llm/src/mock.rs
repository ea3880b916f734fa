//! Scripted service mocks for tests that don't need a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use rag_core::{CompletionService, Embedder, RagError, Result};

/// A completion call as seen by [`MockCompletion`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// A completion service answering from a list of scripted rules.
///
/// Each rule is a substring matched against the system prompt followed by the
/// user prompt; the first matching rule wins. Unmatched calls get an empty
/// string, or an error for mocks built with [`MockCompletion::failing`].
pub struct MockCompletion {
    rules: Vec<(String, Reply)>,
    fallback: Reply,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockCompletion {
    /// A mock that answers every call with an empty string.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Text(String::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock whose every call fails.
    pub fn failing(message: &str) -> Self {
        Self {
            fallback: Reply::Fail(message.to_string()),
            ..Self::new()
        }
    }

    /// Answer calls whose prompts contain `pattern` with `response`.
    pub fn on(mut self, pattern: &str, response: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Reply::Text(response.to_string())));
        self
    }

    /// Fail calls whose prompts contain `pattern`.
    pub fn fail_on(mut self, pattern: &str, message: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Reply::Fail(message.to_string())));
        self
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of calls whose prompts contain `pattern`.
    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.system_prompt.contains(pattern) || c.user_prompt.contains(pattern))
            .count()
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                system_prompt: system_prompt.to_string(),
                user_prompt: user_prompt.to_string(),
                temperature,
                max_tokens,
            });

        let reply = self
            .rules
            .iter()
            .find(|(pattern, _)| {
                system_prompt.contains(pattern.as_str()) || user_prompt.contains(pattern.as_str())
            })
            .map(|(_, reply)| reply)
            .unwrap_or(&self.fallback);

        match reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(message) => Err(RagError::completion(message.clone())),
        }
    }
}

/// A mock embedder producing deterministic vectors.
///
/// Texts without an explicit vector get a hash-derived, L2-normalised one, so
/// distinct texts are almost never near-duplicates of each other.
pub struct MockEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    fail_with: Option<String>,
    batches: AtomicUsize,
}

impl MockEmbedder {
    /// Create a new mock embedder with default settings.
    pub fn new() -> Self {
        Self::with_dimension(64)
    }

    /// Create a mock embedder with a custom dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            fail_with: None,
            batches: AtomicUsize::new(0),
        }
    }

    /// A mock whose every call fails.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Pin the vector returned for `text`.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Number of batched `embed` calls received.
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn hashed_vector(&self, text: &str) -> Vec<f32> {
        let hash = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
                (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
            });
        let mut embedding: Vec<f32> = (0..self.dimension)
            .map(|i| {
                let mixed = hash.rotate_left((i % 64) as u32).wrapping_mul(i as u64 + 1);
                (mixed % 2000) as f32 / 1000.0 - 1.0
            })
            .collect();
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        embedding
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.fail_with {
            return Err(RagError::embedding(message.clone()));
        }

        Ok(texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(*text)
                    .cloned()
                    .unwrap_or_else(|| self.hashed_vector(text))
            })
            .collect())
    }
}
