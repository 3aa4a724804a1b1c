//! Context Assembler
//!
//! Pulls the most relevant earlier results out of the knowledge store and
//! formats them as task/result pairs for the worker prompt.

use crate::knowledge::KnowledgeStore;
use sdk::errors::EngineError;
use sdk::types::{KnowledgeMetadata, Task};
use std::sync::Arc;

pub struct ContextAssembler {
    knowledge: Arc<KnowledgeStore>,
    top_k: usize,
}

impl ContextAssembler {
    pub fn new(knowledge: Arc<KnowledgeStore>, top_k: usize) -> Self {
        Self { knowledge, top_k }
    }

    /// Formatted context for `task`, most relevant first
    pub async fn relevant_context(&self, task: &Task) -> Result<String, EngineError> {
        let matches = self
            .knowledge
            .query_relevant(&task.to_string(), self.top_k)
            .await?;
        Ok(format_context(&matches))
    }
}

pub fn format_context(records: &[KnowledgeMetadata]) -> String {
    records
        .iter()
        .map(|m| format!("Task: {}\nResult: {}", m.task, m.result))
        .collect::<Vec<_>>()
        .join("\n\n")
}
