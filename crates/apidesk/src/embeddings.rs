//! Text embedding models.
//!
//! Retrieval and ingestion share one embedder so that documents and queries land in
//! the same vector space.

pub mod openai;

use async_trait::async_trait;

use crate::errors::RetrievalResult;

pub use openai::{OpenAiEmbedder, OpenAiEmbeddingConfig};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Maps text to a fixed length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::errors::RetrievalError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder for tests. Texts containing a keyword map onto that
    /// keyword's axis, so similarity is predictable.
    pub struct KeywordEmbedder {
        keywords: Vec<String>,
        fail_on: Option<String>,
        calls: AtomicUsize,
    }

    impl KeywordEmbedder {
        pub fn new(keywords: &[&str]) -> Self {
            Self {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                fail_on: None,
                calls: AtomicUsize::new(0),
            }
        }

        /// Fail whenever the text contains `needle`
        pub fn failing_on(mut self, needle: &str) -> Self {
            self.fail_on = Some(needle.to_string());
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn dimension(&self) -> usize {
            self.keywords.len() + 1
        }

        async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(needle) = &self.fail_on {
                if text.contains(needle.as_str()) {
                    return Err(RetrievalError::Upstream("embedding failed".to_string()));
                }
            }

            let lower = text.to_lowercase();
            let mut vector: Vec<f32> = self
                .keywords
                .iter()
                .map(|k| if lower.contains(k.as_str()) { 1.0 } else { 0.0 })
                .collect();
            // constant axis keeps every vector non-zero
            vector.push(0.1);
            Ok(vector)
        }
    }
}
