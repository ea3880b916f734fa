//! rag-core - Core types and traits for the query rewriting system
//!
//! This crate provides the foundational types, collaborator traits, and error
//! handling used throughout the rag-rewrite workspace.

pub mod config;
pub mod error;
pub mod similarity;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{RagError, Result};
pub use similarity::cosine_similarity;
pub use traits::*;
pub use types::*;
