use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{
    IndexHandle, IndexSpec, SimilarityMetric, VectorMatch, VectorRecord, VectorStore,
};
use crate::errors::{RetrievalError, RetrievalResult};

#[derive(Debug, Default)]
struct MemoryIndex {
    dimension: usize,
    metric: SimilarityMetric,
    records: HashMap<String, VectorRecord>,
}

/// In-process vector store with brute-force scoring.
///
/// Suitable for tests and small local corpora. Upserting an existing id replaces it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held by the named index
    pub fn len(&self, index: &str) -> usize {
        self.indexes
            .read()
            .map(|indexes| indexes.get(index).map_or(0, |i| i.records.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }
}

fn poisoned<T>(_: T) -> RetrievalError {
    RetrievalError::IndexUnavailable("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_index(&self, spec: &IndexSpec) -> RetrievalResult<IndexHandle> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        let index = indexes
            .entry(spec.name.clone())
            .or_insert_with(|| MemoryIndex {
                dimension: spec.dimension,
                metric: spec.metric,
                records: HashMap::new(),
            });

        if index.dimension != spec.dimension {
            return Err(RetrievalError::IndexUnavailable(format!(
                "index {} exists with dimension {}, expected {}",
                spec.name, index.dimension, spec.dimension
            )));
        }

        Ok(IndexHandle::new(spec.name.clone(), "memory"))
    }

    async fn upsert_batch(
        &self,
        index: &IndexHandle,
        records: &[VectorRecord],
    ) -> RetrievalResult<usize> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        let target = indexes
            .get_mut(&index.name)
            .ok_or_else(|| RetrievalError::IndexUnavailable(format!("no index {}", index.name)))?;

        if let Some(bad) = records.iter().find(|r| r.values.len() != target.dimension) {
            return Err(RetrievalError::Upstream(format!(
                "record {} has dimension {}, index expects {}",
                bad.id,
                bad.values.len(),
                target.dimension
            )));
        }

        for record in records {
            target.records.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(
        &self,
        index: &IndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> RetrievalResult<Vec<VectorMatch>> {
        let indexes = self.indexes.read().map_err(poisoned)?;
        let target = indexes
            .get(&index.name)
            .ok_or_else(|| RetrievalError::IndexUnavailable(format!("no index {}", index.name)))?;

        let mut matches: Vec<VectorMatch> = target
            .records
            .values()
            .map(|record| VectorMatch {
                id: record.id.clone(),
                score: score(target.metric, vector, &record.values),
                metadata: Some(record.metadata.clone()),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }
}

/// Higher is more similar for every metric
fn score(metric: SimilarityMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        SimilarityMetric::Cosine => cosine_similarity(a, b),
        SimilarityMetric::DotProduct => dot(a, b),
        SimilarityMetric::Euclidean => {
            let distance: f32 = a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt();
            1.0 / (1.0 + distance)
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Returns a value in [-1, 1] where 1 means identical direction.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}
