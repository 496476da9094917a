use std::sync::Arc;
use tracing::{debug, warn};

use crate::embeddings::Embedder;
use crate::errors::{RetrievalError, RetrievalResult};
use crate::vector_store::{IndexHandle, VectorStore};

#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnippet {
    pub text: String,
    pub score: f32,
}

/// Documentation snippets relevant to a query, best match first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub snippets: Vec<ContextSnippet>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    /// Snippet texts separated by a blank line
    pub fn render(&self) -> String {
        self.snippets
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

struct Backend {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    index: IndexHandle,
}

/// Finds documentation relevant to the user's question
pub struct Retriever {
    backend: Option<Backend>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, index: IndexHandle) -> Self {
        Self {
            backend: Some(Backend {
                embedder,
                store,
                index,
            }),
        }
    }

    /// A retriever for a process whose index could not be reached at startup
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Embed the query and return up to `top_k` matching snippets
    pub async fn retrieve_context(
        &self,
        query: &str,
        top_k: usize,
    ) -> RetrievalResult<RetrievedContext> {
        let backend = self.backend.as_ref().ok_or_else(|| {
            RetrievalError::IndexUnavailable("retrieval is disabled".to_string())
        })?;

        if query.trim().is_empty() || top_k == 0 {
            return Ok(RetrievedContext::default());
        }

        let vector = backend.embedder.embed(query).await?;
        let matches = backend.store.query(&backend.index, &vector, top_k).await?;

        let mut snippets: Vec<ContextSnippet> = matches
            .into_iter()
            .filter_map(|m| {
                let text = m.text()?.to_string();
                Some(ContextSnippet {
                    text,
                    score: m.score,
                })
            })
            .collect();
        snippets.sort_by(|a, b| b.score.total_cmp(&a.score));
        snippets.truncate(top_k);
        // cosine and dot product can go negative; callers only ever see [0, 1]
        for snippet in &mut snippets {
            snippet.score = snippet.score.clamp(0.0, 1.0);
        }

        debug!(index = %backend.index.name, snippets = snippets.len(), "retrieved context");
        Ok(RetrievedContext { snippets })
    }

    /// Like [`Retriever::retrieve_context`], but never fails.
    ///
    /// Any error is logged and treated as "no relevant documentation", so the reply can
    /// continue with tools alone.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> String {
        if query.trim().is_empty() {
            return String::new();
        }

        match self.retrieve_context(query, top_k).await {
            Ok(context) => context.render(),
            Err(e) => {
                warn!(error = %e, "retrieval failed, continuing without context");
                String::new()
            }
        }
    }
}
