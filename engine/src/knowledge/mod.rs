//! Knowledge layer
//!
//! Two append-only stores feed context back into the loop:
//! - `KnowledgeStore`: embedded task results in a vector index, queried by
//!   cosine similarity against the next task
//! - `RetrievalIndex`: raw cleaned results, rolled up into the executive
//!   summary the planner sees every cycle

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{KnowledgeMetadata, KnowledgeRecord};

pub mod embedding;
pub mod memory;
pub mod mock;
pub mod pinecone;
pub mod retrieval;
pub mod store;

pub use embedding::OpenAIEmbedder;
pub use memory::InMemoryIndex;
pub use pinecone::PineconeIndex;
pub use retrieval::{RetrievalIndex, SummaryIndex, EMPTY_SUMMARY};
pub use store::KnowledgeStore;

/// Turns text into a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError>;
}

/// A single similarity hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f32,
    pub metadata: KnowledgeMetadata,
}

/// Backing store for knowledge records
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Create the index if it does not exist. Calling it again is a no-op.
    async fn ensure_index(&self) -> Result<(), EngineError>;

    async fn upsert(&self, record: KnowledgeRecord) -> Result<(), EngineError>;

    /// Top `top_k` matches, most similar first
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>, EngineError>;
}

/// Fail loudly when a vector does not have the expected length.
pub fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EngineError> {
    if vector.len() != expected {
        return Err(EngineError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
