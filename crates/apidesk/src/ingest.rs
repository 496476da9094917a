use std::sync::Arc;
use tracing::{info, warn};

use crate::chunker::chunk_text;
use crate::embeddings::Embedder;
use crate::vector_store::{IndexHandle, VectorRecord, VectorStore};

/// Outcome of loading one document into the index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks: usize,
    pub embedded: usize,
    /// Positions of chunks whose embedding failed
    pub skipped: Vec<usize>,
    pub upserted: usize,
    pub failed_batches: Vec<usize>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed_batches.is_empty()
    }
}

/// Chunks, embeds and stores documentation text
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Load `text` into `index`.
    ///
    /// Chunks are embedded one at a time. A chunk that fails to embed is logged and left
    /// out, the rest keep the `chunk-{i}` id of their original position.
    pub async fn run(&self, index: &IndexHandle, text: &str, max_chunk_size: usize) -> IngestReport {
        let chunks = chunk_text(text, max_chunk_size);
        let mut report = IngestReport {
            chunks: chunks.len(),
            ..Default::default()
        };

        let mut records = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            match self.embedder.embed(&chunk).await {
                Ok(values) => records.push(VectorRecord::text_chunk(format!("chunk-{}", i), values, chunk)),
                Err(e) => {
                    warn!(chunk = i, error = %e, "skipping chunk that failed to embed");
                    report.skipped.push(i);
                }
            }
        }
        report.embedded = records.len();

        let summary = self.store.upsert(index, &records).await;
        report.upserted = summary.upserted;
        report.failed_batches = summary.failed_batches;

        info!(
            index = %index.name,
            chunks = report.chunks,
            upserted = report.upserted,
            skipped = report.skipped.len(),
            failed_batches = report.failed_batches.len(),
            "ingestion finished"
        );
        report
    }
}
