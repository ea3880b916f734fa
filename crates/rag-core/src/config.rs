//! Configuration types for the query rewriting system.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RagError, Result};
use crate::types::RewriteStrategy;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Completion and embedding service configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Query rewriting configuration.
    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// Retrieval configuration.
    #[serde(default)]
    pub search: SearchConfig,
}

/// OpenAI-compatible service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL, without the `/v1` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (only needed for hosted providers).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for query rewriting.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Query rewriting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Rewrite queries before retrieval.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Strategy to apply.
    #[serde(default)]
    pub strategy: RewriteStrategy,

    /// Requested number of variants (adjusted per query complexity).
    #[serde(default = "default_max_variants")]
    pub max_variants: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: RewriteStrategy::Hybrid,
            max_variants: 3,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Hits requested from the backend per query variant.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Cap on the fused result list. Unset keeps every unique hit.
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_results: None,
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_chat_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_variants() -> usize {
    3
}

fn default_top_k() -> usize {
    5
}

impl RagConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rag-rewrite").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("rag-rewrite.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.chat_model = model;
        }
        if let Some(model) = lookup("OPENAI_EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
        }
        if let Some(enabled) = lookup("ENABLE_QUERY_REWRITE") {
            self.rewrite.enabled = parse_flag(&enabled).ok_or_else(|| {
                RagError::config(format!("ENABLE_QUERY_REWRITE: invalid flag {:?}", enabled))
            })?;
        }
        if let Some(strategy) = lookup("REWRITE_STRATEGY") {
            self.rewrite.strategy = strategy.parse()?;
        }
        if let Some(top_k) = lookup("TOP_K_RESULTS") {
            self.search.top_k = top_k
                .parse()
                .map_err(|e| RagError::config(format!("TOP_K_RESULTS: {}", e)))?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.rewrite.max_variants == 0 {
            return Err(RagError::config("rewrite.max_variants must be at least 1"));
        }
        if self.search.top_k == 0 {
            return Err(RagError::config("search.top_k must be at least 1"));
        }
        if self.search.max_results == Some(0) {
            return Err(RagError::config("search.max_results must be at least 1"));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.search.top_k, 5);
        assert!(config.rewrite.enabled);
        assert_eq!(config.rewrite.strategy, RewriteStrategy::Hybrid);
        assert_eq!(config.rewrite.max_variants, 3);
        assert_eq!(config.llm.timeout_secs, 30);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[rewrite]\nstrategy = \"expansion\"\nmax_variants = 4\n\n[llm]\nbase_url = \"http://localhost:11434\""
        )
        .unwrap();

        let config = RagConfig::load(file.path()).unwrap();
        assert_eq!(config.rewrite.strategy, RewriteStrategy::Expansion);
        assert_eq!(config.rewrite.max_variants, 4);
        assert!(config.rewrite.enabled);
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.chat_model, "gpt-4-turbo-preview");
        assert_eq!(config.search.top_k, 5);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rewrite\nstrategy = ").unwrap();

        let err = RagConfig::load(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_load_rejects_zero_variants() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rewrite]\nmax_variants = 0").unwrap();

        assert!(RagConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("REWRITE_STRATEGY", "refinement"),
            ("TOP_K_RESULTS", "8"),
        ]
        .into_iter()
        .collect();

        let config = RagConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.rewrite.strategy, RewriteStrategy::Refinement);
        assert_eq!(config.search.top_k, 8);
    }

    #[test]
    fn test_enable_query_rewrite_override() {
        let disabled = RagConfig::default()
            .with_overrides(|k| (k == "ENABLE_QUERY_REWRITE").then(|| "False".to_string()))
            .unwrap();
        assert!(!disabled.rewrite.enabled);

        let mut config = RagConfig::default();
        config.rewrite.enabled = false;
        let enabled = config
            .with_overrides(|k| (k == "ENABLE_QUERY_REWRITE").then(|| "1".to_string()))
            .unwrap();
        assert!(enabled.rewrite.enabled);

        let err = RagConfig::default()
            .with_overrides(|k| (k == "ENABLE_QUERY_REWRITE").then(|| "maybe".to_string()))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_load_max_results() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\ntop_k = 4\nmax_results = 6").unwrap();

        let config = RagConfig::load(file.path()).unwrap();
        assert_eq!(config.search.max_results, Some(6));
        assert!(RagConfig::default().search.max_results.is_none());

        let mut zero = tempfile::NamedTempFile::new().unwrap();
        writeln!(zero, "[search]\nmax_results = 0").unwrap();
        assert!(RagConfig::load(zero.path()).is_err());
    }

    #[test]
    fn test_overrides_reject_unknown_strategy() {
        let result = RagConfig::default().with_overrides(|k| {
            (k == "REWRITE_STRATEGY").then(|| "shuffle".to_string())
        });
        assert!(result.is_err());
    }
}
