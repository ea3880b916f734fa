//! Error types for the query rewriting system.

use thiserror::Error;

/// Result type alias using RagError.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur in the query rewriting system.
#[derive(Error, Debug)]
pub enum RagError {
    /// Completion service call failed.
    #[error("Completion error: {message}")]
    Completion { message: String },

    /// Embedding service call failed.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Vector search backend failed.
    #[error("Retrieval error: {message}")]
    Retrieval { message: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RagError {
    /// Create a completion error.
    pub fn completion(message: impl Into<String>) -> Self {
        Self::Completion {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a retrieval error.
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get a stable error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Completion { .. } => "COMPLETION_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Retrieval { .. } => "RETRIEVAL_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether this error comes from one of the external services.
    ///
    /// These are the failures the rewrite path absorbs instead of surfacing.
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            Self::Completion { .. } | Self::Embedding { .. } | Self::Retrieval { .. }
        )
    }
}
