use super::{check_dimension, Embedder, VectorIndex};
use sdk::errors::EngineError;
use sdk::types::{KnowledgeMetadata, KnowledgeRecord};
use std::sync::Arc;
use tracing::debug;

/// Embedded task results, queried by similarity to the next task.
pub struct KnowledgeStore {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl KnowledgeStore {
    /// Pair an embedder with an index.
    ///
    /// # Errors
    /// `DimensionMismatch` if the two disagree on vector length.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Result<Self, EngineError> {
        if embedder.dimension() != index.dimension() {
            return Err(EngineError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            });
        }
        Ok(Self { embedder, index })
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    /// Create the backing index if absent.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        self.index.ensure_index().await
    }

    /// Embed text with the store's embedder.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        let vector = self.embedder.embed(text).await?;
        check_dimension(self.dimension(), &vector)?;
        Ok(vector)
    }

    pub async fn insert(
        &self,
        vector: Vec<f32>,
        id: impl Into<String>,
        metadata: KnowledgeMetadata,
    ) -> Result<(), EngineError> {
        check_dimension(self.dimension(), &vector)?;

        let record = KnowledgeRecord {
            id: id.into(),
            vector,
            metadata,
        };
        debug!(id = %record.id, index = %self.index.name(), "Inserting knowledge record");
        self.index.upsert(record).await
    }

    /// Metadata of the `k` records most similar to `task_text`, best first.
    pub async fn query_relevant(
        &self,
        task_text: &str,
        k: usize,
    ) -> Result<Vec<KnowledgeMetadata>, EngineError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed(task_text).await?;
        let mut matches = self.index.query(&vector, k).await?;
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);

        debug!(requested = k, found = matches.len(), "Queried knowledge store");
        Ok(matches.into_iter().map(|m| m.metadata).collect())
    }
}
