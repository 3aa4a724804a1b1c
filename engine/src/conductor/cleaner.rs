use crate::llm::{truncate_chars, LLMProvider, Message};
use sdk::errors::EngineError;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CLEANER_SYSTEM_PROMPT: &str = "\
You condense raw research output into a clean summary for a knowledge base. Keep every \
fact, figure, gene, drug and citation relevant to the objective; drop boilerplate, \
navigation text and repetition. Reply with the summary only.";

/// Compresses worker output into storable summaries
pub struct ResultCleaner {
    llm: Arc<dyn LLMProvider>,
    max_input_chars: usize,
}

impl ResultCleaner {
    pub fn new(llm: Arc<dyn LLMProvider>, max_input_chars: usize) -> Self {
        Self {
            llm,
            max_input_chars: max_input_chars.max(1),
        }
    }

    /// Clean one result unit.
    pub async fn clean(&self, raw: &str, objective: &str) -> Result<String, EngineError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(String::new());
        }

        let input = truncate_chars(raw, self.max_input_chars);
        if input.len() < raw.len() {
            warn!(
                chars = raw.chars().count(),
                limit = self.max_input_chars,
                "Result truncated before cleaning"
            );
        }

        let prompt = format!("OBJECTIVE: {}\n\nRAW RESULT:\n{}", objective, input);
        let cleaned = self
            .llm
            .generate(&[Message::system(CLEANER_SYSTEM_PROMPT), Message::user(prompt)])
            .await?;

        debug!(raw = raw.len(), cleaned = cleaned.len(), "Cleaned result");
        Ok(cleaned.trim().to_string())
    }

    /// Clean each article on its own and join the summaries with a blank line.
    pub async fn clean_articles(&self, articles: &[String], objective: &str) -> Result<String, EngineError> {
        let mut cleaned = Vec::with_capacity(articles.len());
        for article in articles {
            cleaned.push(self.clean(article, objective).await?);
        }
        Ok(cleaned.join("\n\n"))
    }
}
