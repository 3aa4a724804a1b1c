//! Shared domain types
//!
//! Tasks flow from the planner to the worker, worker output flows to the
//! cleaner, and cleaned results are stored as knowledge records. All of
//! these are append-only values; nothing is mutated after creation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EngineError;

/// The closed set of tools a task can be routed to.
///
/// The planner attaches a kind to each task when it creates it. The legacy
/// textual convention (`"PUBMED: ..."`, `"MYGENE: ..."`) is still accepted on
/// input and reproduced by `Task`'s `Display` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskKind {
    /// Plain reasoning task answered by the language model
    General,

    /// Gene lookup through the MyGene API
    MyGene,

    /// Literature search through the PubMed (Entrez) API
    PubMed,
}

impl TaskKind {
    /// All supported kinds, in catalogue order
    pub const ALL: [TaskKind; 3] = [TaskKind::General, TaskKind::MyGene, TaskKind::PubMed];

    /// Tag used in prompts and in the textual prefix convention
    pub fn tag(&self) -> &'static str {
        match self {
            TaskKind::General => "GENERAL",
            TaskKind::MyGene => "MYGENE",
            TaskKind::PubMed => "PUBMED",
        }
    }

    /// Prefix used when a task is rendered as text, if any
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            TaskKind::General => None,
            TaskKind::MyGene => Some("MYGENE:"),
            TaskKind::PubMed => Some("PUBMED:"),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TaskKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_end_matches(':').to_ascii_uppercase();
        match normalized.as_str() {
            "GENERAL" | "" => Ok(TaskKind::General),
            "MYGENE" => Ok(TaskKind::MyGene),
            "PUBMED" => Ok(TaskKind::PubMed),
            _ => Err(EngineError::UnknownTaskKind(s.trim().to_string())),
        }
    }
}

/// One planner-generated unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Tool the task is routed to
    pub kind: TaskKind,

    /// Instruction text without any tool prefix
    pub description: String,
}

impl Task {
    /// Create a task with an explicit kind
    pub fn new(kind: TaskKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into().trim().to_string(),
        }
    }

    /// Create a general reasoning task
    pub fn general(description: impl Into<String>) -> Self {
        Self::new(TaskKind::General, description)
    }

    /// Build a task from text that may carry a `MYGENE:`/`PUBMED:` prefix.
    ///
    /// Prefix matching is case-insensitive and only applies at the start of
    /// the text. Text without a recognized prefix becomes a general task.
    pub fn from_prefixed(text: &str) -> Self {
        let trimmed = text.trim();
        for kind in [TaskKind::MyGene, TaskKind::PubMed] {
            if let Some(prefix) = kind.prefix() {
                let head = trimmed.get(..prefix.len());
                if head.is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
                    return Self::new(kind, &trimmed[prefix.len()..]);
                }
            }
        }
        Self::general(trimmed)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.prefix() {
            Some(prefix) => write!(f, "{} {}", prefix, self.description),
            None => f.write_str(&self.description),
        }
    }
}

/// What the worker produced for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutput {
    /// Plain text answer
    Text(String),

    /// Generated program source that must be executed to obtain the result
    Code(String),

    /// Independent literature records, each cleaned separately
    Articles(Vec<String>),
}

impl WorkerOutput {
    /// True when the output must go through the code sandbox
    pub fn is_executable_code(&self) -> bool {
        matches!(self, WorkerOutput::Code(_))
    }

    /// Render the raw output for display
    pub fn display_text(&self) -> String {
        match self {
            WorkerOutput::Text(text) | WorkerOutput::Code(text) => text.clone(),
            WorkerOutput::Articles(articles) => articles.join("\n\n"),
        }
    }
}

/// Metadata stored alongside each vector.
///
/// Field names are serialized as `Task` and `Result` to stay compatible with
/// indexes written by earlier runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeMetadata {
    #[serde(rename = "Task")]
    pub task: String,

    #[serde(rename = "Result")]
    pub result: String,
}

impl KnowledgeMetadata {
    pub fn new(task: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            result: result.into(),
        }
    }
}

/// A single entry in the vector similarity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: KnowledgeMetadata,
}

/// Record id for a given cycle counter value
pub fn record_id(counter: u32) -> String {
    format!("doc_id_{}", counter)
}

/// A document in the retrieval (summary) index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalDocument {
    pub id: String,
    pub text: String,
}
