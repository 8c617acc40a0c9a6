//! Collaborator traits for the document collection.
//!
//! [`Retrieval`] turns a query into ranked passages or a grounded answer;
//! [`AssetStore`] answers whether a named figure exists and where it lives.
//! Neither method depends on the other having been called first.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::RetrievalError;

/// A ranked text passage returned by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// The passage text
    pub text: String,

    /// Where it came from (file name, document id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Relevance score; higher is better
    #[serde(default)]
    pub score: f32,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
            score: 0.0,
        }
    }
}

/// The retrieval collaborator.
#[async_trait]
pub trait Retrieval: Send + Sync {
    /// A human-readable name for this source.
    fn name(&self) -> &str;

    /// Passages relevant to `query`, best first.
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RetrievalError>;

    /// A retrieval-augmented answer to `query`.
    async fn rag_answer(&self, query: &str) -> Result<String, RetrievalError>;
}

/// The asset-storage collaborator.
pub trait AssetStore: Send + Sync {
    /// Whether the named asset exists.
    fn exists(&self, name: &str) -> bool;

    /// Where the named asset is (or would be) stored.
    fn resolve(&self, name: &str) -> PathBuf;
}
