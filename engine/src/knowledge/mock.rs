//! Deterministic offline embedder
//!
//! Hashes lowercase word tokens into buckets and L2-normalizes the result,
//! so texts that share words land close together under cosine similarity.

use super::Embedder;
use async_trait::async_trait;
use sdk::errors::EngineError;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct KeywordEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::cosine_similarity;

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = KeywordEmbedder::new(256);
        let query = embedder.vectorize("BRCA1 mutation breast cancer");
        let near = embedder.vectorize("breast cancer BRCA1 carriers");
        let far = embedder.vectorize("insulin signalling in liver");

        assert!(cosine_similarity(&query, &near) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_vectorize_is_deterministic() {
        let embedder = KeywordEmbedder::new(64);
        assert_eq!(embedder.vectorize("TP53"), embedder.vectorize("tp53"));
        assert_eq!(embedder.vectorize("").len(), 64);
    }
}
