use super::{check_dimension, cosine_similarity, ScoredMatch, VectorIndex};
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::KnowledgeRecord;
use std::cmp::Ordering;
use tokio::sync::RwLock;

/// Process-local vector index with cosine ranking.
///
/// Used as the offline `memory` backend. Contents are lost on exit.
pub struct InMemoryIndex {
    name: String,
    dimension: usize,
    records: RwLock<Vec<KnowledgeRecord>>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            records: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of stored records in insertion order
    pub async fn records(&self) -> Vec<KnowledgeRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ensure_index(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn upsert(&self, record: KnowledgeRecord) -> Result<(), EngineError> {
        check_dimension(self.dimension, &record.vector)?;

        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>, EngineError> {
        check_dimension(self.dimension, vector)?;

        let records = self.records.read().await;
        let mut matches: Vec<ScoredMatch> = records
            .iter()
            .map(|r| ScoredMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }
}
