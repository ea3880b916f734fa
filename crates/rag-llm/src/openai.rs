//! OpenAI-compatible HTTP client for completions and embeddings.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rag_core::{CompletionService, Embedder, LlmConfig, RagError, Result};

/// Client for an OpenAI-compatible API (OpenAI, vLLM, llama-server, Ollama's
/// `/v1` shim, ...).
pub struct OpenAiClient {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Create a client from configuration.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> reqwest::Result<reqwest::Response> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        request.send().await
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature,
            max_tokens,
        };

        debug!(
            "Chat completion: model={}, temperature={}, max_tokens={}",
            self.config.chat_model, temperature, max_tokens
        );

        let resp = self
            .post("chat/completions", &request)
            .await
            .map_err(|e| RagError::completion(format!("Failed to call chat API: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::completion(format!(
                "Chat API returned {}: {}",
                status, body
            )));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RagError::completion(format!("Malformed chat response: {}", e)))?;

        extract_completion(body)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
        };

        debug!("Embedding {} texts with {}", texts.len(), self.config.embedding_model);

        let resp = self
            .post("embeddings", &request)
            .await
            .map_err(|e| RagError::embedding(format!("Failed to call embeddings API: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::embedding(format!(
                "Embeddings API returned {}: {}",
                status, body
            )));
        }

        let body: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| RagError::embedding(format!("Malformed embeddings response: {}", e)))?;

        extract_embeddings(body, texts.len())
    }
}

fn extract_completion(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| RagError::completion("Chat response contained no message content"))
}

fn extract_embeddings(body: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut data = body.data;
    if data.len() != expected {
        return Err(RagError::embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    // The API may return items out of input order.
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}
