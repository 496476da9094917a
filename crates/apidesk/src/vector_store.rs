//! Vector index adapters
//!
//! Two backends share one trait: a hosted Pinecone index for real deployments, and an
//! in-process store for tests and local runs.
//!
//! Records carry their source text in metadata under the `text` key, which is what the
//! retriever reads back out of query matches.

pub mod memory;
pub mod pinecone;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::errors::RetrievalResult;

pub use memory::MemoryStore;
pub use pinecone::{PineconeConfig, PineconeStore};

/// Largest number of records sent in a single upsert call
pub const MAX_UPSERT_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    #[serde(rename = "dotproduct")]
    DotProduct,
    Euclidean,
}

/// What an index must look like to hold our embeddings
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: SimilarityMetric,
    pub cloud: String,
    pub region: String,
}

impl IndexSpec {
    pub fn new<S: Into<String>>(name: S, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric: SimilarityMetric::Cosine,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

/// A ready index and the host its data plane is served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    pub name: String,
    pub host: String,
}

impl IndexHandle {
    pub fn new<N: Into<String>, H: Into<String>>(name: N, host: H) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    /// A record for one chunk of documentation text
    pub fn text_chunk<S: Into<String>, T: Into<String>>(id: S, values: Vec<f32>, text: T) -> Self {
        let mut metadata = Map::new();
        metadata.insert("text".to_string(), Value::String(text.into()));
        Self {
            id: id.into(),
            values,
            metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl VectorMatch {
    /// The source text stored with the record, if any
    pub fn text(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("text")?.as_str()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub upserted: usize,
    /// Zero-based positions of the batches that were rejected
    pub failed_batches: Vec<usize>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the index if needed and wait until it accepts traffic
    async fn ensure_index(&self, spec: &IndexSpec) -> RetrievalResult<IndexHandle>;

    /// Write one batch in a single call, returning how many records were stored
    async fn upsert_batch(
        &self,
        index: &IndexHandle,
        records: &[VectorRecord],
    ) -> RetrievalResult<usize>;

    /// Nearest neighbours of `vector`, best first, at most `top_k` of them
    async fn query(
        &self,
        index: &IndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> RetrievalResult<Vec<VectorMatch>>;

    /// Write records in batches of at most [`MAX_UPSERT_BATCH`].
    ///
    /// A failing batch is logged and skipped, later batches are still attempted.
    async fn upsert(&self, index: &IndexHandle, records: &[VectorRecord]) -> UpsertSummary {
        let mut summary = UpsertSummary::default();

        for (batch, chunk) in records.chunks(MAX_UPSERT_BATCH).enumerate() {
            match self.upsert_batch(index, chunk).await {
                Ok(count) => summary.upserted += count,
                Err(e) => {
                    warn!(
                        index = %index.name,
                        batch,
                        records = chunk.len(),
                        error = %e,
                        "skipping failed upsert batch"
                    );
                    summary.failed_batches.push(batch);
                }
            }
        }

        summary
    }
}
