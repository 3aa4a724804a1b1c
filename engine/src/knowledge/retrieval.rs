//! Executive summary over every stored result
//!
//! `SummaryIndex` does a full-corpus rollup each time it is asked: documents
//! are split into chunks no longer than the character budget, packed into
//! batches under that budget, each batch is summarized, and the partial
//! summaries are combined level by level until a single answer remains. Nothing is cached, so cost grows with the number of
//! documents.

use crate::llm::{truncate_chars, LLMProvider, Message};
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::RetrievalDocument;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Summary reported before any task has produced a result
pub const EMPTY_SUMMARY: &str = "No tasks completed yet.";

const SUMMARY_QUESTION: &str =
    "What is the executive summary of the results so far? Cover the main findings, the evidence behind them and the open gaps.";

#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    async fn insert_text(&self, text: &str, id: &str) -> Result<(), EngineError>;

    /// Synthesis of everything inserted so far
    async fn summarize(&self) -> Result<String, EngineError>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub struct SummaryIndex {
    llm: Arc<dyn LLMProvider>,
    documents: RwLock<Vec<RetrievalDocument>>,
    batch_chars: usize,
}

impl SummaryIndex {
    /// `batch_chars` bounds the text sent in a single summarization call
    pub fn new(llm: Arc<dyn LLMProvider>, batch_chars: usize) -> Self {
        Self {
            llm,
            documents: RwLock::new(Vec::new()),
            batch_chars: batch_chars.max(64),
        }
    }

    pub async fn documents(&self) -> Vec<RetrievalDocument> {
        self.documents.read().await.clone()
    }

    async fn summarize_batch(&self, chunks: &[String], combining: bool) -> Result<String, EngineError> {
        let system = if combining {
            "You merge partial summaries of research results into one executive summary. Keep every distinct finding; drop repetition."
        } else {
            "You write executive summaries of research results. Answer only from the context provided."
        };

        let context = chunks.join("\n---------------------\n");
        let prompt = format!(
            "Context information is below.\n---------------------\n{}\n---------------------\nGiven the context information and not prior knowledge, answer the question: {}",
            context, SUMMARY_QUESTION
        );

        let reply = self
            .llm
            .generate(&[Message::system(system), Message::user(prompt)])
            .await?;
        Ok(reply.trim().to_string())
    }
}

/// Split `text` into consecutive pieces of at most `max_chars` characters.
pub(crate) fn split_chars(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(max_chars).map(|c| c.iter().collect()).collect()
}

/// Pack texts into batches whose joined length stays under `budget`.
///
/// Every batch holds at least `min_per_batch` items (except a lone
/// remainder), and each item is cut to `budget / min_per_batch` chars so
/// that guarantee never breaks the budget.
pub(crate) fn pack_batches(items: &[String], budget: usize, min_per_batch: usize) -> Vec<Vec<String>> {
    let min_per_batch = min_per_batch.max(1);
    let item_cap = (budget / min_per_batch).max(1);

    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for item in items {
        let original_len = item.chars().count();
        let item = truncate_chars(item, item_cap).to_string();
        let len = item.chars().count();
        if len < original_len {
            warn!(chars = original_len, limit = item_cap, "Summary input truncated to fit batch");
        }

        if current.len() >= min_per_batch && current_len + len > budget {
            batches.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += len;
        current.push(item);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[async_trait]
impl RetrievalIndex for SummaryIndex {
    async fn insert_text(&self, text: &str, id: &str) -> Result<(), EngineError> {
        let mut documents = self.documents.write().await;
        documents.push(RetrievalDocument {
            id: id.to_string(),
            text: text.to_string(),
        });
        debug!(id, total = documents.len(), "Inserted retrieval document");
        Ok(())
    }

    async fn summarize(&self) -> Result<String, EngineError> {
        let texts: Vec<String> = self
            .documents
            .read()
            .await
            .iter()
            .map(|d| d.text.clone())
            .collect();

        if texts.is_empty() {
            return Ok(EMPTY_SUMMARY.to_string());
        }

        let chunks: Vec<String> = texts
            .iter()
            .flat_map(|text| split_chars(text, self.batch_chars))
            .collect();
        if chunks.len() > texts.len() {
            debug!(documents = texts.len(), chunks = chunks.len(), "Split long documents");
        }

        let mut level = 0;
        let mut layer = Vec::new();
        for batch in pack_batches(&chunks, self.batch_chars, 1) {
            layer.push(self.summarize_batch(&batch, false).await?);
        }

        while layer.len() > 1 {
            level += 1;
            let mut next = Vec::new();
            for batch in pack_batches(&layer, self.batch_chars, 2) {
                next.push(self.summarize_batch(&batch, true).await?);
            }
            layer = next;
        }

        info!(
            documents = texts.len(),
            levels = level + 1,
            "Built executive summary"
        );
        Ok(layer.pop().unwrap_or_else(|| EMPTY_SUMMARY.to_string()))
    }

    async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;

    #[tokio::test]
    async fn test_empty_index_returns_placeholder_without_model_call() {
        let llm = MockProvider::fixed("should not be used");
        let index = SummaryIndex::new(Arc::new(llm.clone()), 1000);

        assert_eq!(index.summarize().await.unwrap(), EMPTY_SUMMARY);
        assert_eq!(llm.call_count(), 0);
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_single_batch_is_one_call() {
        let llm = MockProvider::fixed("BRCA1 findings so far");
        let index = SummaryIndex::new(Arc::new(llm.clone()), 1000);
        index.insert_text("first result", "doc_id_1").await.unwrap();
        index.insert_text("second result", "doc_id_2").await.unwrap();

        assert_eq!(index.summarize().await.unwrap(), "BRCA1 findings so far");
        assert_eq!(llm.call_count(), 1);

        let prompt = &llm.calls()[0][1].content;
        assert!(prompt.contains("first result"));
        assert!(prompt.contains("second result"));
    }

    #[tokio::test]
    async fn test_large_corpus_is_tree_summarized() {
        let llm = MockProvider::fixed("partial");
        let index = SummaryIndex::new(Arc::new(llm.clone()), 100);
        for i in 0..4 {
            index
                .insert_text(&"x".repeat(80), &format!("doc_id_{}", i + 1))
                .await
                .unwrap();
        }

        // Four leaf calls, then one call combining the four short partials.
        assert_eq!(index.summarize().await.unwrap(), "partial");
        assert_eq!(llm.call_count(), 5);
    }

    #[tokio::test]
    async fn test_summarize_sees_every_document() {
        let llm = MockProvider::fixed("summary");
        let index = SummaryIndex::new(Arc::new(llm.clone()), 100);
        for i in 0..6 {
            index
                .insert_text(&format!("finding-{} {}", i, "y".repeat(60)), &format!("doc_id_{}", i))
                .await
                .unwrap();
        }
        index.summarize().await.unwrap();

        let all_prompts: String = llm
            .calls()
            .iter()
            .map(|c| c[1].content.clone())
            .collect();
        for i in 0..6 {
            assert!(all_prompts.contains(&format!("finding-{}", i)));
        }
    }

    #[test]
    fn test_pack_batches_respects_budget() {
        let items: Vec<String> = vec!["a".repeat(40), "b".repeat(40), "c".repeat(40)];
        let batches = pack_batches(&items, 100, 1);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_pack_batches_always_pairs_when_combining() {
        let items: Vec<String> = vec!["a".repeat(90), "b".repeat(90), "c".repeat(90)];
        let batches = pack_batches(&items, 100, 2);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert!(batches[0].iter().all(|s| s.len() <= 50));
    }

    #[tokio::test]
    async fn test_long_document_is_chunked_not_truncated() {
        let llm = MockProvider::fixed("partial");
        let index = SummaryIndex::new(Arc::new(llm.clone()), 100);
        let document = format!("head {}TAIL-MARKER", "z".repeat(150));
        index.insert_text(&document, "doc_id_1").await.unwrap();

        index.summarize().await.unwrap();

        // Two leaf chunks, then one combining call
        assert_eq!(llm.call_count(), 3);
        let calls = llm.calls();
        assert!(calls[0][1].content.contains("head "));
        assert!(calls[1][1].content.contains("TAIL-MARKER"));
    }

    #[test]
    fn test_split_chars_keeps_every_char() {
        let pieces = split_chars("héllo wörld", 4);
        assert_eq!(pieces, vec!["héll", "o wö", "rld"]);
        assert_eq!(pieces.concat(), "héllo wörld");
        assert_eq!(split_chars("", 4), vec![String::new()]);
    }
}
