//! Insight SDK
//!
//! Shared types and the error taxonomy used by the Insight engine and its
//! integration tests.

/// Error types and handling
pub mod errors;

/// Task, worker output and knowledge record types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use types::{
    record_id, KnowledgeMetadata, KnowledgeRecord, RetrievalDocument, Task, TaskKind,
    WorkerOutput,
};
